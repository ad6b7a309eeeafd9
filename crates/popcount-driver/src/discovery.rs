//! Runtime discovery of the DMA buffer
//!
//! The u-dma-buf kernel module reserves a physically contiguous buffer at
//! boot and publishes where it lives through two sysfs attributes. Nothing
//! here is hardcoded beyond the attribute names: the address and size are
//! read fresh on every run.

use crate::error::{PopcountError, Result};
use popcount_chip::layout::{UDMABUF_PHYS_ADDR_ATTR, UDMABUF_SIZE_ATTR};
use std::path::Path;

/// Location and extent of the pre-allocated DMA buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaBufferInfo {
    /// Physical (bus) address, as seen by the DMA engine
    pub phys_addr: u64,
    /// Allocated size in bytes
    pub size: usize,
}

impl DmaBufferInfo {
    /// Read `phys_addr` (hex) and `size` (decimal) from a u-dma-buf sysfs directory.
    ///
    /// # Errors
    ///
    /// Returns `PopcountError::ResourceUnavailable` if either attribute is
    /// missing, empty, unparsable, or the size is zero.
    pub fn locate(sysfs_dir: &Path) -> Result<Self> {
        tracing::debug!("Loading u-dma-buf attributes from {}", sysfs_dir.display());

        let size_path = sysfs_dir.join(UDMABUF_SIZE_ATTR);
        let size_text = read_attribute(&size_path)?;
        let size = size_text.parse::<usize>().map_err(|e| {
            PopcountError::resource_unavailable(&size_path, format!("bad size {size_text:?}: {e}"))
        })?;
        if size == 0 {
            return Err(PopcountError::resource_unavailable(
                &size_path,
                "buffer size is 0 (u-dma-buf not configured?)",
            ));
        }

        let addr_path = sysfs_dir.join(UDMABUF_PHYS_ADDR_ATTR);
        let addr_text = read_attribute(&addr_path)?;
        let phys_addr = parse_hex(&addr_text).ok_or_else(|| {
            PopcountError::resource_unavailable(
                &addr_path,
                format!("bad physical address {addr_text:?}"),
            )
        })?;

        tracing::info!("u-dma-buf at {phys_addr:#x}, {size} bytes");

        Ok(Self { phys_addr, size })
    }

    /// Usable transfer capacity: the smaller of the buffer and the engine limit.
    #[must_use]
    pub fn capacity(&self, engine_max: usize) -> usize {
        self.size.min(engine_max)
    }
}

/// Read a single-line sysfs attribute, trimmed.
fn read_attribute(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PopcountError::resource_unavailable(path, e.to_string()))?;
    let value = raw.trim();
    if value.is_empty() {
        return Err(PopcountError::resource_unavailable(path, "read returned no data"));
    }
    Ok(value.to_owned())
}

fn parse_hex(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}
