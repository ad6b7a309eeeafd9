//! Backend abstraction
//!
//! Every backend answers the same question: how many bits are set in this
//! stream. The CLI and the cross-check treat them uniformly.

use crate::backends::{DmaBackend, MmioBackend, SoftwareBackend};
use crate::config::DeviceConfig;
use crate::error::{PopcountError, Result};
use std::fmt::Debug;
use std::io::Read;

/// Anything that can count the set bits of a byte stream
pub trait PopcountBackend: Debug {
    /// Count set bits in everything `input` yields.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure or hardware fault.
    fn count(&mut self, input: &mut dyn Read) -> Result<u64>;

    /// Get backend type for reporting
    fn backend_type(&self) -> BackendType;
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Accelerator fed by the MM2S DMA channel
    Dma,
    /// Accelerator fed by register writes
    Mmio,
    /// Host CPU
    Software,
}

impl BackendType {
    /// Whether the count comes from the accelerator's 32-bit register.
    pub const fn is_hardware(self) -> bool {
        !matches!(self, Self::Software)
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dma => write!(f, "DMA"),
            Self::Mmio => write!(f, "MMIO"),
            Self::Software => write!(f, "Software"),
        }
    }
}

/// Backend selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSelection {
    /// DMA if the hardware resources exist, otherwise software
    Auto,
    /// Force the DMA backend
    Dma,
    /// Force the programmed-I/O backend
    Mmio,
    /// Force the software backend
    Software,
}

/// Build the requested backend.
///
/// # Errors
///
/// Returns error if a forced hardware backend cannot map its resources, or
/// if `Auto` fails for a reason other than missing hardware.
pub fn select_backend(
    selection: BackendSelection,
    cfg: &DeviceConfig,
) -> Result<Box<dyn PopcountBackend>> {
    match selection {
        BackendSelection::Auto => match DmaBackend::open(cfg) {
            Ok(backend) => {
                tracing::info!("Using DMA backend");
                Ok(Box::new(backend))
            }
            Err(e) if e.is_unavailable() => {
                tracing::warn!("Hardware unavailable ({e}), falling back to software");
                Ok(Box::new(SoftwareBackend::new()))
            }
            Err(e) => Err(e),
        },
        BackendSelection::Dma => {
            DmaBackend::open(cfg).map(|b| Box::new(b) as Box<dyn PopcountBackend>)
        }
        BackendSelection::Mmio => {
            MmioBackend::open(cfg).map(|b| Box::new(b) as Box<dyn PopcountBackend>)
        }
        BackendSelection::Software => Ok(Box::new(SoftwareBackend::new())),
    }
}

/// Compare a hardware count against the software reference.
///
/// The accelerator's accumulator is 32 bits wide, so only the low 32 bits
/// of the software count are compared.
///
/// # Errors
///
/// Returns `PopcountError::Mismatch` if the counts differ.
pub fn cross_check(hardware: u64, software: u64) -> Result<()> {
    let mask = u64::from(u32::MAX);
    if hardware & mask == software & mask {
        Ok(())
    } else {
        Err(PopcountError::Mismatch { hardware, software })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn missing_hardware(dir: &TempDir) -> DeviceConfig {
        DeviceConfig::default()
            .with_uio(dir.path().join("uio0"), 0x1_0000)
            .with_udmabuf(dir.path().join("udmabuf0"), dir.path().join("sysfs"))
    }

    #[test]
    fn auto_falls_back_to_software() {
        let dir = TempDir::new().unwrap();
        let backend = select_backend(BackendSelection::Auto, &missing_hardware(&dir)).unwrap();
        assert_eq!(backend.backend_type(), BackendType::Software);
    }

    #[test]
    fn forced_dma_reports_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = select_backend(BackendSelection::Dma, &missing_hardware(&dir)).unwrap_err();
        assert!(matches!(err, PopcountError::ResourceUnavailable { .. }), "{err}");
    }

    #[test]
    fn forced_mmio_reports_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = select_backend(BackendSelection::Mmio, &missing_hardware(&dir)).unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn cross_check_compares_low_32_bits() {
        assert!(cross_check(16, 16).is_ok());
        assert!(cross_check(3, (1 << 32) + 3).is_ok());
        assert!(matches!(
            cross_check(15, 16),
            Err(PopcountError::Mismatch { hardware: 15, software: 16 })
        ));
    }

    #[test]
    fn display_names() {
        assert_eq!(BackendType::Dma.to_string(), "DMA");
        assert!(BackendType::Mmio.is_hardware());
        assert!(!BackendType::Software.is_hardware());
    }
}
