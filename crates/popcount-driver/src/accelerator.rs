//! Register protocol for the popcount accelerator and its MM2S DMA channel
//!
//! [`Accelerator`] owns the control window and exposes intent-level
//! operations: reset the counter, read it, feed it a word, and run one DMA
//! transfer. Callers never see offsets; [`Register`] is the only place they
//! are computed.
//!
//! # Transfer handshake (PG021, Direct Register Mode)
//!
//! ```text
//! 1. MM2S_DMACR |= RS                 start the channel
//! 2. poll MM2S_DMASR until !Halted    channel running
//!    fence                            buffer copy ordered before the trigger
//! 3. MM2S_SA     = source address
//! 4. MM2S_LENGTH = byte count         this write starts the transfer
//! 5. poll MM2S_DMASR until Idle       transfer complete
//! ```
//!
//! The steps must run in this order and one transfer at a time: the
//! engine has a single outstanding-transfer slot and the source buffer is
//! reused in place.

use crate::config::DeviceConfig;
use crate::error::{PopcountError, Result};
use crate::mmio::RegisterIo;
use crate::poll::{poll_until, Condition, PollConfig, PollOutcome};
use popcount_chip::regs::{counter, dma};
use std::sync::atomic::{fence, Ordering};
use std::time::Duration;

/// Named accelerator registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Popcount reset (W)
    CounterReset,
    /// Popcount accumulator (R), programmed-I/O input (W)
    CounterValue,
    /// MM2S_DMACR (R/W)
    DmaControl,
    /// MM2S_DMASR (R/W1C)
    DmaStatus,
    /// MM2S_SA (W)
    DmaSourceAddress,
    /// MM2S_LENGTH (W)
    DmaLength,
}

impl Register {
    /// Byte offset from the control window base.
    pub const fn offset(self, dma_base: usize) -> usize {
        match self {
            Self::CounterReset => counter::RESET,
            Self::CounterValue => counter::VALUE,
            Self::DmaControl => dma_base + dma::MM2S_DMACR,
            Self::DmaStatus => dma_base + dma::MM2S_DMASR,
            Self::DmaSourceAddress => dma_base + dma::MM2S_SA,
            Self::DmaLength => dma_base + dma::MM2S_LENGTH,
        }
    }
}

/// Host handle to the accelerator's control window
#[derive(Debug)]
pub struct Accelerator<R: RegisterIo> {
    regs: R,
    dma_base: usize,
    engine_max: usize,
    transfer_limit: usize,
    poll_timeout: Duration,
}

impl<R: RegisterIo> Accelerator<R> {
    /// Wrap a control window laid out as described by `cfg`.
    ///
    /// Until [`Self::with_buffer_capacity`] is called, transfers are limited
    /// only by the engine maximum.
    pub fn new(regs: R, cfg: &DeviceConfig) -> Self {
        Self {
            regs,
            dma_base: cfg.dma_offset,
            engine_max: cfg.dma_max_transfer,
            transfer_limit: cfg.dma_max_transfer,
            poll_timeout: cfg.poll_timeout,
        }
    }

    /// Limit transfers to min(engine maximum, `capacity`).
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.transfer_limit = self.engine_max.min(capacity);
        self
    }

    /// Largest byte length [`Self::submit_transfer`] accepts.
    pub const fn transfer_limit(&self) -> usize {
        self.transfer_limit
    }

    /// Borrow the underlying register window.
    pub const fn registers(&self) -> &R {
        &self.regs
    }

    /// Release the register window.
    pub fn into_inner(self) -> R {
        self.regs
    }

    /// Zero the accumulator. Must precede the first transfer of a run.
    ///
    /// # Errors
    ///
    /// Returns error if the register write fails.
    pub fn reset_counter(&mut self) -> Result<()> {
        tracing::debug!("Resetting count");
        self.write(Register::CounterReset, counter::RESET_PULSE)
    }

    /// Current accumulator value.
    ///
    /// # Errors
    ///
    /// Returns error if the register read fails.
    pub fn read_count(&self) -> Result<u32> {
        self.read(Register::CounterValue)
    }

    /// Push one value through the counter by programmed I/O.
    ///
    /// # Errors
    ///
    /// Returns error if the register write fails.
    pub fn feed(&mut self, value: u32) -> Result<()> {
        self.write(Register::CounterValue, value)
    }

    /// Count the set bits of a single value: reset, feed, read back.
    ///
    /// # Errors
    ///
    /// Returns error if any register access fails.
    pub fn count_word(&mut self, value: u32) -> Result<u32> {
        self.reset_counter()?;
        self.feed(value)?;
        self.read_count()
    }

    /// Stream `len` bytes at physical address `src` into the accelerator.
    ///
    /// Returns once the engine reports the transfer complete. A zero-length
    /// request touches no registers.
    ///
    /// # Errors
    ///
    /// - `TransferTooLarge` if `len` exceeds [`Self::transfer_limit`]
    /// - `AddressOutOfRange` if the source range does not fit the 32-bit address register
    /// - `HardwareTimeout` if the channel does not start or finish within the poll timeout
    /// - `HardwareError` if the status register reports a DMA error
    pub fn submit_transfer(&mut self, src: u64, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        if len > self.transfer_limit {
            return Err(PopcountError::TransferTooLarge {
                requested: len,
                capacity: self.transfer_limit,
            });
        }
        let length = u32::try_from(len).map_err(|_| PopcountError::TransferTooLarge {
            requested: len,
            capacity: self.transfer_limit,
        })?;
        let end = src.checked_add(len as u64 - 1);
        let address = match (u32::try_from(src), end.map(u32::try_from)) {
            (Ok(a), Some(Ok(_))) => a,
            _ => return Err(PopcountError::AddressOutOfRange { address: src }),
        };

        tracing::debug!("Starting DMA transfer: {len} bytes from {src:#x}");

        // Step 1: start the MM2S channel.
        let control = self.read(Register::DmaControl)?;
        self.write(Register::DmaControl, control | dma::control::RUN_STOP)?;

        // Step 2: wait for the halt bit to deassert.
        self.wait("MM2S halted deassert", Condition::Clear(dma::status::HALTED))?;

        // The chunk copied into the DMA buffer must be visible before the engine reads it.
        fence(Ordering::SeqCst);

        // Step 3: source address.
        self.write(Register::DmaSourceAddress, address)?;

        // Step 4: length. Writing a non-zero value starts the transfer.
        self.write(Register::DmaLength, length)?;

        // Step 5: wait for completion.
        let status = self.wait("MM2S idle", Condition::Set(dma::status::IDLE))?;
        if status & dma::status::IOC_IRQ != 0 {
            self.write(Register::DmaStatus, dma::status::IOC_IRQ)?;
        }

        tracing::debug!("DMA transfer complete");
        Ok(())
    }

    fn wait(&self, operation: &'static str, until: Condition) -> Result<u32> {
        let cfg = PollConfig {
            until,
            error_mask: dma::status::ERROR_MASK,
            timeout: self.poll_timeout,
        };
        match poll_until(|| self.read(Register::DmaStatus), cfg)? {
            PollOutcome::Ready { status, polls } => {
                tracing::trace!("{operation}: {status:#x} after {polls} polls");
                Ok(status)
            }
            PollOutcome::TimedOut { status } => {
                tracing::error!("{operation} timed out, last status {status:#x}");
                #[allow(clippy::cast_possible_truncation)]
                Err(PopcountError::HardwareTimeout {
                    operation,
                    duration_ms: self.poll_timeout.as_millis() as u64,
                })
            }
        }
    }

    fn read(&self, reg: Register) -> Result<u32> {
        self.regs.read32(reg.offset(self.dma_base))
    }

    fn write(&mut self, reg: Register, value: u32) -> Result<()> {
        self.regs.write32(reg.offset(self.dma_base), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Fault, RegisterAccess, SimAccelerator};

    const PHYS: u64 = 0x1f00_0000;

    fn setup(fault: Fault) -> Accelerator<SimAccelerator> {
        let cfg = DeviceConfig::default().with_poll_timeout(Duration::from_millis(10));
        let (sim, _mem) = SimAccelerator::new(&cfg, PHYS, 8192);
        Accelerator::new(sim.with_fault(fault), &cfg).with_buffer_capacity(8192)
    }

    #[test]
    fn register_offsets_follow_dma_base() {
        assert_eq!(Register::CounterReset.offset(0x1000), 0x0);
        assert_eq!(Register::CounterValue.offset(0x1000), 0x4);
        assert_eq!(Register::DmaControl.offset(0x1000), 0x1000);
        assert_eq!(Register::DmaStatus.offset(0x1000), 0x1004);
        assert_eq!(Register::DmaSourceAddress.offset(0x1000), 0x1018);
        assert_eq!(Register::DmaLength.offset(0x1000), 0x1028);
    }

    #[test]
    fn handshake_writes_in_documented_order() {
        let mut accel = setup(Fault::None);
        accel.submit_transfer(PHYS, 16).unwrap();

        let writes: Vec<(usize, u32)> = accel
            .registers()
            .log()
            .into_iter()
            .filter_map(|a| match a {
                RegisterAccess::Write { offset, value } => Some((offset, value)),
                _ => None,
            })
            .collect();

        assert_eq!(writes[0], (0x1000, dma::control::RUN_STOP));
        assert_eq!(writes[1], (0x1018, 0x1f00_0000));
        assert_eq!(writes[2], (0x1028, 16));
    }

    #[test]
    fn halted_must_clear_before_address_is_written() {
        let mut accel = setup(Fault::None);
        accel.submit_transfer(PHYS, 4).unwrap();
        let log = accel.registers().log();
        let sa = log
            .iter()
            .position(|a| matches!(a, RegisterAccess::Write { offset: 0x1018, .. }))
            .unwrap();
        let running_seen = log[..sa].iter().any(|a| {
            matches!(a, RegisterAccess::Read { offset: 0x1004, value } if value & dma::status::HALTED == 0)
        });
        assert!(running_seen, "source address written before channel left halt");
    }

    #[test]
    fn oversized_transfer_rejected_without_touching_hardware() {
        let mut accel = setup(Fault::None);
        let err = accel.submit_transfer(PHYS, 8193).unwrap_err();
        assert!(matches!(
            err,
            PopcountError::TransferTooLarge { requested: 8193, capacity: 8192 }
        ));
        assert!(accel.registers().log().is_empty());
    }

    #[test]
    fn limit_is_min_of_engine_and_buffer() {
        let cfg = DeviceConfig::default();
        let (sim, _mem) = SimAccelerator::new(&cfg, PHYS, 4096);
        let mut accel = Accelerator::new(sim, &cfg).with_buffer_capacity(4096);
        assert_eq!(accel.transfer_limit(), 4096);
        assert!(accel.submit_transfer(PHYS, 4097).is_err());

        let (sim, _mem) = SimAccelerator::new(&cfg, PHYS, 1 << 20);
        let accel = Accelerator::new(sim, &cfg).with_buffer_capacity(1 << 20);
        assert_eq!(accel.transfer_limit(), 8192);
    }

    #[test]
    fn address_above_4g_rejected() {
        let mut accel = setup(Fault::None);
        let err = accel.submit_transfer(0x1_0000_0000, 4).unwrap_err();
        assert!(matches!(err, PopcountError::AddressOutOfRange { .. }));
    }

    #[test]
    fn stuck_halt_times_out() {
        let mut accel = setup(Fault::StuckHalted);
        let err = accel.submit_transfer(PHYS, 4).unwrap_err();
        assert!(matches!(
            err,
            PopcountError::HardwareTimeout { operation: "MM2S halted deassert", .. }
        ));
    }

    #[test]
    fn never_idle_times_out() {
        let mut accel = setup(Fault::NeverIdle);
        let err = accel.submit_transfer(PHYS, 4).unwrap_err();
        assert!(matches!(
            err,
            PopcountError::HardwareTimeout { operation: "MM2S idle", .. }
        ));
    }

    #[test]
    fn slave_error_is_hardware_error() {
        let mut accel = setup(Fault::SlaveError);
        let err = accel.submit_transfer(PHYS, 4).unwrap_err();
        assert!(matches!(err, PopcountError::HardwareError { .. }));
    }

    #[test]
    fn count_word_resets_first() {
        let mut accel = setup(Fault::None);
        accel.feed(0xFFFF_FFFF).unwrap();
        assert_eq!(accel.count_word(0b1011).unwrap(), 3);
    }

    #[test]
    fn zero_length_is_a_no_op() {
        let mut accel = setup(Fault::None);
        accel.submit_transfer(PHYS, 0).unwrap();
        assert!(accel.registers().log().is_empty());
    }
}
