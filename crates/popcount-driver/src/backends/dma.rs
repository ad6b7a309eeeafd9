//! DMA backend
//!
//! The full hardware path: locate the u-dma-buf, map it and the UIO
//! window, then stream the input through the MM2S channel one
//! buffer-sized chunk at a time.
//!
//! Both mappings are owned by the backend and unmapped when it is dropped,
//! on success and on every error path. If mapping the UIO window fails,
//! the already-mapped DMA buffer is released before the error returns.

use crate::accelerator::Accelerator;
use crate::backend::{BackendType, PopcountBackend};
use crate::config::DeviceConfig;
use crate::discovery::DmaBufferInfo;
use crate::dma_buffer::DmaBuffer;
use crate::error::Result;
use crate::mmio::{Access, DmaMemory, MappedRegion, RegisterIo};
use crate::transfer::{stream_to_accelerator, TransferStats};
use std::io::Read;

/// Accelerator fed by DMA from the u-dma-buf
#[derive(Debug)]
pub struct DmaBackend<R: RegisterIo = MappedRegion, M: DmaMemory = MappedRegion> {
    accel: Accelerator<R>,
    buffer: DmaBuffer<M>,
    last: Option<TransferStats>,
}

impl DmaBackend {
    /// Locate and map the hardware resources described by `cfg`.
    ///
    /// # Errors
    ///
    /// - `ResourceUnavailable` if the sysfs attributes or device nodes are missing
    /// - `MappingFailed` if either mapping is rejected
    pub fn open(cfg: &DeviceConfig) -> Result<Self> {
        tracing::info!("Initializing DMA backend");

        let info = DmaBufferInfo::locate(&cfg.udmabuf_sysfs)?;
        let capacity = info.capacity(cfg.dma_max_transfer);
        tracing::debug!(
            "DMA capacity {capacity} bytes (buffer {}, engine max {})",
            info.size,
            cfg.dma_max_transfer
        );

        let data = MappedRegion::open(&cfg.udmabuf_device, capacity, Access::ReadWrite)?;
        let control = MappedRegion::open(&cfg.uio_device, cfg.uio_size, Access::ReadWrite)?;

        let buffer = DmaBuffer::new(data, info.phys_addr, capacity)?;
        let accel = Accelerator::new(control, cfg).with_buffer_capacity(capacity);
        Ok(Self::from_parts(accel, buffer))
    }
}

impl<R: RegisterIo, M: DmaMemory> DmaBackend<R, M> {
    /// Assemble a backend from an already-mapped control window and buffer.
    pub fn from_parts(accel: Accelerator<R>, buffer: DmaBuffer<M>) -> Self {
        let accel = accel.with_buffer_capacity(buffer.capacity());
        Self {
            accel,
            buffer,
            last: None,
        }
    }

    /// Stream `input` and return the per-run totals.
    ///
    /// # Errors
    ///
    /// Propagates I/O and register-protocol errors.
    pub fn stream(&mut self, input: &mut dyn Read) -> Result<TransferStats> {
        let stats = stream_to_accelerator(input, &mut self.accel, &mut self.buffer)?;
        self.last = Some(stats);
        Ok(stats)
    }

    /// Totals of the most recent successful run.
    pub const fn last_stats(&self) -> Option<TransferStats> {
        self.last
    }

    /// Borrow the accelerator handle.
    pub const fn accelerator(&self) -> &Accelerator<R> {
        &self.accel
    }
}

impl<R, M> PopcountBackend for DmaBackend<R, M>
where
    R: RegisterIo + std::fmt::Debug,
    M: DmaMemory + std::fmt::Debug,
{
    fn count(&mut self, input: &mut dyn Read) -> Result<u64> {
        self.stream(input).map(|s| u64::from(s.count))
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Dma
    }
}
