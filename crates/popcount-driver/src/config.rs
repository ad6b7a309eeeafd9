//! Device configuration
//!
//! Defaults describe the stock board image (see `popcount_chip::layout`);
//! every field can be overridden for other block designs or for tests that
//! point the driver at a fake sysfs tree.

use popcount_chip::layout;
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on each status-register wait.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Where the accelerator's resources live and how to drive them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// UIO device exposing the control/status window
    pub uio_device: PathBuf,
    /// Size of the control window in bytes
    pub uio_size: usize,
    /// u-dma-buf character device
    pub udmabuf_device: PathBuf,
    /// sysfs directory holding `phys_addr` and `size`
    pub udmabuf_sysfs: PathBuf,
    /// Offset of the DMA register block inside the control window
    pub dma_offset: usize,
    /// Largest single transfer the DMA engine accepts
    pub dma_max_transfer: usize,
    /// Bound on each status-register wait
    pub poll_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            uio_device: PathBuf::from(layout::UIO_DEVICE),
            uio_size: layout::UIO_MAP_SIZE,
            udmabuf_device: PathBuf::from(layout::UDMABUF_DEVICE),
            udmabuf_sysfs: PathBuf::from(layout::UDMABUF_SYSFS),
            dma_offset: layout::DMA_OFFSET,
            dma_max_transfer: layout::DMA_MAX_TRANSFER,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl DeviceConfig {
    /// Override the UIO device path.
    #[must_use]
    pub fn with_uio(mut self, path: impl Into<PathBuf>, size: usize) -> Self {
        self.uio_device = path.into();
        self.uio_size = size;
        self
    }

    /// Override the u-dma-buf device and its sysfs directory.
    #[must_use]
    pub fn with_udmabuf(mut self, device: impl Into<PathBuf>, sysfs: impl Into<PathBuf>) -> Self {
        self.udmabuf_device = device.into();
        self.udmabuf_sysfs = sysfs.into();
        self
    }

    /// Override the DMA block offset and maximum transfer length.
    #[must_use]
    pub fn with_dma(mut self, offset: usize, max_transfer: usize) -> Self {
        self.dma_offset = offset;
        self.dma_max_transfer = max_transfer;
        self
    }

    /// Override the poll timeout.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_board_image() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.uio_device, PathBuf::from("/dev/uio0"));
        assert_eq!(cfg.uio_size, 0x1_0000);
        assert_eq!(cfg.dma_offset, 0x1000);
        assert_eq!(cfg.dma_max_transfer, 8192);
        assert_eq!(cfg.poll_timeout, Duration::from_millis(100));
    }

    #[test]
    fn builders_override_fields() {
        let cfg = DeviceConfig::default()
            .with_uio("/dev/uio3", 0x2000)
            .with_udmabuf("/dev/udmabuf1", "/tmp/sysfs")
            .with_dma(0x800, 4096)
            .with_poll_timeout(Duration::from_millis(5));
        assert_eq!(cfg.uio_device, PathBuf::from("/dev/uio3"));
        assert_eq!(cfg.uio_size, 0x2000);
        assert_eq!(cfg.udmabuf_sysfs, PathBuf::from("/tmp/sysfs"));
        assert_eq!(cfg.dma_offset, 0x800);
        assert_eq!(cfg.dma_max_transfer, 4096);
        assert_eq!(cfg.poll_timeout, Duration::from_millis(5));
    }
}
