//! Chunked transfer loop
//!
//! Streams an input through the DMA buffer: read a chunk, load it at
//! offset 0, submit it, wait for completion, repeat. The host keeps no
//! count of its own; the accelerator accumulates it.

use crate::accelerator::Accelerator;
use crate::dma_buffer::DmaBuffer;
use crate::error::Result;
use crate::io::read_chunk;
use crate::mmio::{DmaMemory, RegisterIo};
use std::io::Read;

/// Totals for one streamed input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferStats {
    /// Transfers submitted
    pub chunks: usize,
    /// Bytes submitted
    pub bytes: u64,
    /// Final accumulator value
    pub count: u32,
}

/// Reset the counter, stream `input` through `buffer`, and read the result.
///
/// The staging buffer is allocated once, sized to the smaller of the DMA
/// buffer and the engine's transfer limit. Each chunk is submitted as a
/// single transfer of its exact length; the last one is not padded.
///
/// # Errors
///
/// Propagates I/O errors from `input` and any error from the register
/// protocol. Nothing is retried.
pub fn stream_to_accelerator<R, M, I>(
    input: &mut I,
    accel: &mut Accelerator<R>,
    buffer: &mut DmaBuffer<M>,
) -> Result<TransferStats>
where
    R: RegisterIo,
    M: DmaMemory,
    I: Read + ?Sized,
{
    let chunk_size = buffer.capacity().min(accel.transfer_limit());
    let mut staging = vec![0u8; chunk_size];
    let mut stats = TransferStats::default();

    accel.reset_counter()?;

    tracing::debug!("Reading input in chunks of {chunk_size} bytes");
    loop {
        let n = read_chunk(input, &mut staging)?;
        if n == 0 {
            break;
        }
        buffer.load(&staging[..n])?;
        accel.submit_transfer(buffer.phys_addr(), n)?;
        stats.chunks += 1;
        stats.bytes += n as u64;
    }

    stats.count = accel.read_count()?;
    tracing::info!(
        "Streamed {} bytes in {} transfers, count={}",
        stats.bytes,
        stats.chunks,
        stats.count
    );
    Ok(stats)
}
