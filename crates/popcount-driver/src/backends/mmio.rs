//! Programmed-I/O backend
//!
//! Feeds the counter by writing each input word straight into the
//! counter-value register. Needs only the UIO window, no DMA buffer; one
//! register write per word, so it is far slower than DMA but useful for
//! bring-up when the DMA engine or u-dma-buf is not configured.

use crate::accelerator::Accelerator;
use crate::backend::{BackendType, PopcountBackend};
use crate::config::DeviceConfig;
use crate::error::Result;
use crate::io::read_chunk;
use crate::mmio::{Access, MappedRegion, RegisterIo};
use popcount_chip::layout::STREAM_BEAT_BYTES;
use std::io::Read;

/// Host read size for programmed I/O.
const PIO_CHUNK: usize = 0x1_0000;

/// Accelerator fed word by word over MMIO
#[derive(Debug)]
pub struct MmioBackend<R: RegisterIo = MappedRegion> {
    accel: Accelerator<R>,
}

impl MmioBackend {
    /// Map the UIO window described by `cfg`.
    ///
    /// # Errors
    ///
    /// Returns `ResourceUnavailable` or `MappingFailed` if the window cannot be mapped.
    pub fn open(cfg: &DeviceConfig) -> Result<Self> {
        tracing::info!("Initializing MMIO backend");
        let control = MappedRegion::open(&cfg.uio_device, cfg.uio_size, Access::ReadWrite)?;
        Ok(Self::from_accelerator(Accelerator::new(control, cfg)))
    }
}

impl<R: RegisterIo> MmioBackend<R> {
    /// Wrap an existing accelerator handle.
    pub const fn from_accelerator(accel: Accelerator<R>) -> Self {
        Self { accel }
    }

    /// Borrow the accelerator handle.
    pub const fn accelerator(&self) -> &Accelerator<R> {
        &self.accel
    }

    /// Reset, feed every word then every trailing byte, and read the count.
    ///
    /// # Errors
    ///
    /// Propagates I/O and register errors.
    pub fn count_stream(&mut self, input: &mut dyn Read) -> Result<u32> {
        let mut buf = vec![0u8; PIO_CHUNK];
        self.accel.reset_counter()?;
        loop {
            let n = read_chunk(input, &mut buf)?;
            if n == 0 {
                break;
            }
            let words = buf[..n].chunks_exact(STREAM_BEAT_BYTES);
            let tail = words.remainder();
            for word in words {
                self.accel.feed(bytemuck::pod_read_unaligned::<u32>(word))?;
            }
            for &byte in tail {
                self.accel.feed(u32::from(byte))?;
            }
        }
        self.accel.read_count()
    }
}

impl<R: RegisterIo + std::fmt::Debug> PopcountBackend for MmioBackend<R> {
    fn count(&mut self, input: &mut dyn Read) -> Result<u64> {
        self.count_stream(input).map(u64::from)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Mmio
    }
}
