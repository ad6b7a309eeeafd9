//! Bounded status-register polling
//!
//! The DMA engine signals progress only through status bits, so every wait
//! is a busy-poll. Each poll has a deadline; there is no unbounded spin.

use crate::error::{PopcountError, Result};
use std::time::{Duration, Instant};

/// Polls between cooperative yields.
const YIELD_INTERVAL: u32 = 1024;

/// What the poll is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Every bit of the mask reads as 1
    Set(u32),
    /// Every bit of the mask reads as 0
    Clear(u32),
}

impl Condition {
    const fn holds(self, value: u32) -> bool {
        match self {
            Self::Set(mask) => value & mask == mask,
            Self::Clear(mask) => value & mask == 0,
        }
    }
}

/// Result of a bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Condition observed; carries the status value and the number of reads
    Ready {
        /// Last status value read
        status: u32,
        /// Reads it took
        polls: u32,
    },
    /// Deadline passed before the condition held
    TimedOut {
        /// Last status value read
        status: u32,
    },
}

/// Parameters for one status wait.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Condition that ends the wait
    pub until: Condition,
    /// Bits that abort the wait with a hardware error
    pub error_mask: u32,
    /// Deadline measured from the first read
    pub timeout: Duration,
}

/// Read `read` until `cfg.until` holds or `cfg.timeout` elapses.
///
/// The register is always read at least once, so a condition that already
/// holds is reported as `Ready` even with a zero timeout.
///
/// # Errors
///
/// Propagates read errors, and returns `PopcountError::HardwareError` as
/// soon as any `error_mask` bit is observed.
pub fn poll_until<F>(mut read: F, cfg: PollConfig) -> Result<PollOutcome>
where
    F: FnMut() -> Result<u32>,
{
    let start = Instant::now();
    let mut polls = 0u32;
    loop {
        let status = read()?;
        polls = polls.saturating_add(1);

        if status & cfg.error_mask != 0 {
            return Err(PopcountError::hardware_error(format!(
                "status {status:#010x} has error bits {:#x}",
                status & cfg.error_mask
            )));
        }
        if cfg.until.holds(status) {
            return Ok(PollOutcome::Ready { status, polls });
        }
        if start.elapsed() >= cfg.timeout {
            return Ok(PollOutcome::TimedOut { status });
        }
        if polls % YIELD_INTERVAL == 0 {
            std::thread::yield_now();
        }
        std::hint::spin_loop();
    }
}
