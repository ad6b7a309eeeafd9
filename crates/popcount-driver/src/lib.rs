// SPDX-License-Identifier: AGPL-3.0-only

//! Userspace driver for the AXI popcount accelerator.
//!
//! Streams a file through a bit-counting accelerator that sits behind a
//! UIO register window and an AXI DMA MM2S channel, and cross-checks the
//! result against a pure-software count.
//!
//! # Backend hierarchy
//!
//! ```text
//! Primary:
//!   DmaBackend       u-dma-buf + MM2S direct register mode
//!
//! Bring-up:
//!   MmioBackend      one counter-register write per word, UIO only
//!
//! Reference / fallback:
//!   SoftwareBackend  host CPU, no hardware
//! ```
//!
//! # Hardware path
//!
//! ```text
//! DmaBufferInfo::locate   sysfs phys_addr + size
//!        │
//! MappedRegion::open ×2   /dev/udmabuf0 (data), /dev/uio0 (registers)
//!        │
//! Accelerator::reset_counter
//!        │
//! stream_to_accelerator   read chunk → DmaBuffer::load → submit_transfer → poll idle
//!        │
//! Accelerator::read_count
//!        │
//! Drop                    munmap both regions
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use popcount_driver::{select_backend, BackendSelection, DeviceConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = DeviceConfig::default();
//! let mut backend = select_backend(BackendSelection::Dma, &cfg)?;
//! let mut input = std::fs::File::open("data.bin")?;
//! println!("Counted {} ones", backend.count(&mut input)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod accelerator;
mod backend;
pub mod backends;
mod config;
mod discovery;
mod dma_buffer;
mod error;
pub mod io;
pub mod mmio;
pub mod poll;
pub mod sim;
mod transfer;

pub use accelerator::{Accelerator, Register};
pub use backend::{cross_check, select_backend, BackendSelection, BackendType, PopcountBackend};
pub use backends::software::{count_set_bits, count_stream, popcount32};
pub use backends::{DmaBackend, MmioBackend, SoftwareBackend};
pub use config::{DeviceConfig, DEFAULT_POLL_TIMEOUT};
pub use discovery::DmaBufferInfo;
pub use dma_buffer::DmaBuffer;
pub use error::{PopcountError, Result};
pub use mmio::{Access, DmaMemory, MappedRegion, RegisterIo};
pub use transfer::{stream_to_accelerator, TransferStats};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        select_backend, Accelerator, BackendSelection, DeviceConfig, DmaBackend, DmaBuffer,
        MappedRegion, PopcountBackend, PopcountError, Result, SoftwareBackend,
    };
}
