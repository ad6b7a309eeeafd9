//! The reusable DMA source buffer

use crate::error::{PopcountError, Result};
use crate::mmio::DmaMemory;

/// Host view of the single DMA-capable buffer
///
/// `phys_addr` is only ever written into the engine's source register; the
/// host reads and writes the same memory through `memory`. Every chunk is
/// loaded at offset 0, replacing the previous one.
#[derive(Debug)]
pub struct DmaBuffer<M: DmaMemory> {
    memory: M,
    phys_addr: u64,
    capacity: usize,
}

impl<M: DmaMemory> DmaBuffer<M> {
    /// Describe `memory` (mapped from the buffer at `phys_addr`) with a
    /// usable capacity of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if `capacity` is zero or larger than the mapping.
    pub fn new(memory: M, phys_addr: u64, capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > memory.capacity() {
            return Err(PopcountError::OutOfBounds {
                offset: 0,
                len: capacity,
                limit: memory.capacity(),
            });
        }
        Ok(Self {
            memory,
            phys_addr,
            capacity,
        })
    }

    /// Physical address of the buffer's first byte.
    pub const fn phys_addr(&self) -> u64 {
        self.phys_addr
    }

    /// Largest chunk that can be loaded.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy `chunk` to the start of the buffer.
    ///
    /// # Errors
    ///
    /// Returns `TransferTooLarge` if the chunk exceeds the capacity.
    pub fn load(&mut self, chunk: &[u8]) -> Result<()> {
        if chunk.len() > self.capacity {
            return Err(PopcountError::TransferTooLarge {
                requested: chunk.len(),
                capacity: self.capacity,
            });
        }
        self.memory.write_bytes(0, chunk)
    }

    /// Release the underlying memory.
    pub fn into_inner(self) -> M {
        self.memory
    }
}
