// SPDX-License-Identifier: AGPL-3.0-only

//! Software reference backend
//!
//! Counts set bits on the CPU, with no hardware interaction and no shared
//! state with the accelerator path. It serves two purposes:
//!
//! 1. **Cross-check**: the `--verify` mode compares the accelerator's count
//!    against this one.
//! 2. **Fallback**: `BackendSelection::Auto` uses it when the UIO or
//!    u-dma-buf resources are missing.
//!
//! Input is consumed in 4-byte words; the 1–3 trailing bytes of a chunk are
//! widened to a word and counted individually.

use crate::backend::{BackendType, PopcountBackend};
use crate::error::Result;
use crate::io::read_chunk;
use std::io::Read;

/// Read size for the software path.
pub const SOFTWARE_CHUNK: usize = 0x1_0000;

/// Set bits in one word.
///
/// Clears the lowest set bit until none remain, so the loop runs once per
/// set bit rather than once per bit position.
pub const fn popcount32(mut x: u32) -> u32 {
    let mut count = 0;
    while x != 0 {
        x &= x - 1;
        count += 1;
    }
    count
}

/// Set bits in a finite byte sequence.
pub fn count_set_bits(bytes: &[u8]) -> u64 {
    let words = bytes.chunks_exact(4);
    let tail = words.remainder();
    let body: u64 = words
        .map(|w| u64::from(popcount32(bytemuck::pod_read_unaligned::<u32>(w))))
        .sum();
    let rest: u64 = tail.iter().map(|&b| u64::from(popcount32(u32::from(b)))).sum();
    body + rest
}

/// Set bits in everything `input` yields.
///
/// # Errors
///
/// Returns any I/O error from the reader.
pub fn count_stream<R: Read + ?Sized>(input: &mut R) -> Result<u64> {
    let mut buf = vec![0u8; SOFTWARE_CHUNK];
    let mut total = 0u64;
    loop {
        let n = read_chunk(input, &mut buf)?;
        if n == 0 {
            break;
        }
        total += count_set_bits(&buf[..n]);
    }
    Ok(total)
}

/// Software (host CPU) backend.
#[derive(Debug, Default)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    /// Create a software backend.
    pub const fn new() -> Self {
        Self
    }
}

impl PopcountBackend for SoftwareBackend {
    fn count(&mut self, input: &mut dyn Read) -> Result<u64> {
        let total = count_stream(input)?;
        tracing::debug!("Software count: {total}");
        Ok(total)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }
}
