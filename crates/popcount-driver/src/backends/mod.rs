//! Counting backends
//!
//! Three backends available:
//! - **DMA**: streams the input through the MM2S channel from the u-dma-buf (fast path)
//! - **MMIO**: writes each word into the counter register (no DMA buffer needed)
//! - **Software**: host-CPU reference, no hardware

pub mod dma;
pub mod mmio;
pub mod software;

pub use dma::DmaBackend;
pub use mmio::MmioBackend;
pub use software::SoftwareBackend;
