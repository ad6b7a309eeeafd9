//! Error types for popcount driver operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for popcount operations
pub type Result<T> = std::result::Result<T, PopcountError>;

/// Errors that can occur while driving the accelerator or counting in software
#[derive(Debug, Error)]
pub enum PopcountError {
    /// I/O error reading the input stream
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// A device node or sysfs attribute is missing, unreadable, or empty
    #[error("Resource unavailable: {}: {reason}", resource.display())]
    ResourceUnavailable {
        /// Path that was checked
        resource: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// The kernel rejected the mapping
    #[error("Mapping failed: {}: {reason}", resource.display())]
    MappingFailed {
        /// Path being mapped
        resource: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// Register polling exceeded its bound
    #[error("Hardware timeout: {operation} after {duration_ms}ms")]
    HardwareTimeout {
        /// Wait that timed out
        operation: &'static str,
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// The DMA engine reported an error in its status register
    #[error("Hardware error: {reason}")]
    HardwareError {
        /// Reason for failure
        reason: String,
    },

    /// A transfer longer than the engine or buffer can take was requested
    #[error("Transfer of {requested} bytes exceeds limit of {capacity} bytes")]
    TransferTooLarge {
        /// Requested byte length
        requested: usize,
        /// min(engine maximum, buffer capacity)
        capacity: usize,
    },

    /// The physical address does not fit the 32-bit source-address register
    #[error("Physical address {address:#x} not reachable by the DMA engine")]
    AddressOutOfRange {
        /// Offending physical address
        address: u64,
    },

    /// Access outside a mapped region
    #[error("Out of bounds access: offset={offset:#x}, size={len}, limit={limit:#x}")]
    OutOfBounds {
        /// Byte offset of the access
        offset: usize,
        /// Byte length of the access
        len: usize,
        /// Size of the region
        limit: usize,
    },

    /// Register offset not word aligned
    #[error("Misaligned register access at offset {offset:#x}")]
    Misaligned {
        /// Byte offset of the access
        offset: usize,
    },

    /// Hardware and software counts disagree
    #[error("Count mismatch: hardware={hardware}, software={software}")]
    Mismatch {
        /// Count reported by the accelerator
        hardware: u64,
        /// Count computed on the host
        software: u64,
    },
}

impl PopcountError {
    /// Create a resource unavailable error
    pub fn resource_unavailable(resource: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a mapping failed error
    pub fn mapping_failed(resource: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MappingFailed {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a hardware error
    pub fn hardware_error(reason: impl Into<String>) -> Self {
        Self::HardwareError {
            reason: reason.into(),
        }
    }

    /// Whether the error means the hardware path cannot be used at all on
    /// this machine (as opposed to failing mid-run).
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ResourceUnavailable { .. } | Self::MappingFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_resource() {
        let e = PopcountError::resource_unavailable("/dev/uio0", "No such file or directory");
        assert_eq!(
            e.to_string(),
            "Resource unavailable: /dev/uio0: No such file or directory"
        );
        assert!(e.is_unavailable());
    }

    #[test]
    fn timeout_is_not_unavailability() {
        let e = PopcountError::HardwareTimeout {
            operation: "MM2S idle",
            duration_ms: 100,
        };
        assert!(!e.is_unavailable());
        assert!(e.to_string().contains("100ms"));
    }
}
