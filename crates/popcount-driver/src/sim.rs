//! Register-level model of the popcount block design
//!
//! `SimAccelerator` implements [`RegisterIo`] with the same observable
//! behaviour as the UIO window: the counter registers, and an MM2S channel
//! that leaves halt a few status reads after RS is set, consumes the source
//! buffer when the length register is written, and raises Idle a few reads
//! later. [`SimMemory`] plays the u-dma-buf; the model reads it at the
//! physical address written to MM2S_SA.
//!
//! Every register access, and every host write into the buffer, is logged
//! in one shared sequence so tests can check the handshake order. Faults
//! can be injected to exercise the timeout and error paths.

use crate::config::DeviceConfig;
use crate::error::{PopcountError, Result};
use crate::mmio::{DmaMemory, RegisterIo};
use popcount_chip::regs::{counter, dma};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Status reads between setting RS and Halted clearing.
const HALT_LATENCY: u32 = 2;
/// Status reads between the length write and Idle asserting.
const TRANSFER_LATENCY: u32 = 3;

/// One logged access to the control window or the DMA buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAccess {
    /// Read returning `value`
    Read {
        /// Byte offset in the window
        offset: usize,
        /// Value returned
        value: u32,
    },
    /// Write of `value`
    Write {
        /// Byte offset in the window
        offset: usize,
        /// Value written
        value: u32,
    },
    /// Host copy of `len` bytes into the DMA buffer at `offset`
    BufferWrite {
        /// Byte offset in the buffer
        offset: usize,
        /// Bytes copied
        len: usize,
    },
}

type AccessLog = Rc<RefCell<Vec<RegisterAccess>>>;

/// Injected misbehaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// Behaves like working hardware
    #[default]
    None,
    /// Halted never deasserts after RS is set
    StuckHalted,
    /// Transfers start but Idle never asserts
    NeverIdle,
    /// Every transfer ends with an AXI slave error
    SlaveError,
}

/// DMA buffer shared between the host side and the simulated engine
#[derive(Debug, Clone)]
pub struct SimMemory {
    bytes: Rc<RefCell<Vec<u8>>>,
    log: AccessLog,
}

impl SimMemory {
    /// Zero-filled buffer of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: Rc::new(RefCell::new(vec![0u8; size])),
            log: Rc::default(),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.borrow().clone()
    }
}

impl DmaMemory for SimMemory {
    fn capacity(&self) -> usize {
        self.bytes.borrow().len()
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let mut mem = self.bytes.borrow_mut();
        let limit = mem.len();
        let dst = offset
            .checked_add(data.len())
            .and_then(|end| mem.get_mut(offset..end))
            .ok_or(PopcountError::OutOfBounds {
                offset,
                len: data.len(),
                limit,
            })?;
        dst.copy_from_slice(data);
        self.log.borrow_mut().push(RegisterAccess::BufferWrite {
            offset,
            len: data.len(),
        });
        Ok(())
    }
}

/// Simulated control window
#[derive(Debug)]
pub struct SimAccelerator {
    window: usize,
    dma_base: usize,
    phys_base: u64,
    memory: SimMemory,
    fault: Fault,

    count: Cell<u32>,
    control: u32,
    status: Cell<u32>,
    source: u32,
    length: u32,
    halt_countdown: Cell<Option<u32>>,
    transfer_countdown: Cell<Option<u32>>,

    transfers: RefCell<Vec<usize>>,
    log: AccessLog,
}

impl SimAccelerator {
    /// Model laid out per `cfg`, with a DMA buffer of `buffer_size` bytes at `phys_base`.
    ///
    /// Returns the model and the host's handle to the shared buffer.
    pub fn new(cfg: &DeviceConfig, phys_base: u64, buffer_size: usize) -> (Self, SimMemory) {
        let memory = SimMemory::new(buffer_size);
        let sim = Self {
            window: cfg.uio_size,
            dma_base: cfg.dma_offset,
            phys_base,
            memory: memory.clone(),
            fault: Fault::None,
            count: Cell::new(0),
            control: 0,
            status: Cell::new(dma::status::HALTED),
            source: 0,
            length: 0,
            halt_countdown: Cell::new(None),
            transfer_countdown: Cell::new(None),
            transfers: RefCell::new(Vec::new()),
            log: Rc::clone(&memory.log),
        };
        (sim, memory)
    }

    /// Inject a fault.
    #[must_use]
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    /// All register accesses and buffer writes so far, oldest first.
    pub fn log(&self) -> Vec<RegisterAccess> {
        self.log.borrow().clone()
    }

    /// Byte length of every transfer started so far.
    pub fn transfers(&self) -> Vec<usize> {
        self.transfers.borrow().clone()
    }

    /// Accumulator value, without logging a register read.
    pub fn count(&self) -> u32 {
        self.count.get()
    }

    fn check(&self, offset: usize) -> Result<()> {
        if offset % 4 != 0 {
            return Err(PopcountError::Misaligned { offset });
        }
        if offset + 4 > self.window {
            return Err(PopcountError::OutOfBounds {
                offset,
                len: 4,
                limit: self.window,
            });
        }
        Ok(())
    }

    fn set_status(&self, bits: u32) {
        self.status.set(self.status.get() | bits);
    }

    fn clear_status(&self, bits: u32) {
        self.status.set(self.status.get() & !bits);
    }

    /// Advance the engine by one status read.
    fn tick(&self) {
        if let Some(n) = self.halt_countdown.get() {
            if n <= 1 {
                self.halt_countdown.set(None);
                self.clear_status(dma::status::HALTED);
            } else {
                self.halt_countdown.set(Some(n - 1));
            }
        }
        if let Some(n) = self.transfer_countdown.get() {
            if n <= 1 {
                self.transfer_countdown.set(None);
                self.complete_transfer();
            } else {
                self.transfer_countdown.set(Some(n - 1));
            }
        }
    }

    fn complete_transfer(&self) {
        let mem = self.memory.bytes.borrow();
        let start = u64::from(self.source)
            .checked_sub(self.phys_base)
            .and_then(|off| usize::try_from(off).ok());
        let bytes = start.and_then(|s| mem.get(s..s + self.length as usize));
        match bytes {
            Some(bytes) => {
                let ones: u32 = bytes.iter().map(|b| b.count_ones()).sum();
                self.count.set(self.count.get().wrapping_add(ones));
                self.set_status(dma::status::IDLE | dma::status::IOC_IRQ);
            }
            None => self.set_status(dma::status::DMA_DEC_ERR | dma::status::ERR_IRQ),
        }
    }

    fn start_transfer(&mut self, length: u32) {
        self.length = length;
        if self.status.get() & dma::status::HALTED != 0 {
            // Length written while halted: the engine flags it and does nothing.
            self.set_status(dma::status::DMA_INT_ERR | dma::status::ERR_IRQ);
            return;
        }
        self.transfers.borrow_mut().push(length as usize);
        self.clear_status(dma::status::IDLE);
        match self.fault {
            Fault::NeverIdle => {}
            Fault::SlaveError => self.set_status(dma::status::DMA_SLV_ERR | dma::status::ERR_IRQ),
            Fault::None | Fault::StuckHalted => {
                self.transfer_countdown.set(Some(TRANSFER_LATENCY));
            }
        }
    }

    fn write_control(&mut self, value: u32) {
        if value & dma::control::RESET != 0 {
            self.control = 0;
            self.status.set(dma::status::HALTED);
            self.halt_countdown.set(None);
            self.transfer_countdown.set(None);
            return;
        }
        let starting = value & dma::control::RUN_STOP != 0 && self.control & dma::control::RUN_STOP == 0;
        self.control = value;
        if starting && self.fault != Fault::StuckHalted {
            self.halt_countdown.set(Some(HALT_LATENCY));
        }
    }
}

impl RegisterIo for SimAccelerator {
    fn read32(&self, offset: usize) -> Result<u32> {
        self.check(offset)?;
        let value = if offset == counter::VALUE {
            self.count.get()
        } else if offset == self.dma_base + dma::MM2S_DMACR {
            self.control
        } else if offset == self.dma_base + dma::MM2S_DMASR {
            self.tick();
            self.status.get()
        } else {
            0
        };
        self.log.borrow_mut().push(RegisterAccess::Read { offset, value });
        Ok(value)
    }

    fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check(offset)?;
        self.log.borrow_mut().push(RegisterAccess::Write { offset, value });

        if offset == counter::RESET {
            if value != 0 {
                self.count.set(0);
            }
        } else if offset == counter::VALUE {
            self.count.set(self.count.get().wrapping_add(value.count_ones()));
        } else if offset == self.dma_base + dma::MM2S_DMACR {
            self.write_control(value);
        } else if offset == self.dma_base + dma::MM2S_DMASR {
            self.clear_status(value & (dma::status::IOC_IRQ | dma::status::ERR_IRQ));
        } else if offset == self.dma_base + dma::MM2S_SA {
            self.source = value;
        } else if offset == self.dma_base + dma::MM2S_LENGTH {
            self.start_transfer(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_registers_behave() {
        let (mut sim, _mem) = SimAccelerator::new(&DeviceConfig::default(), 0, 16);
        sim.write32(counter::VALUE, 0xFF).unwrap();
        assert_eq!(sim.read32(counter::VALUE).unwrap(), 8);
        sim.write32(counter::RESET, 1).unwrap();
        assert_eq!(sim.count(), 0);
    }

    #[test]
    fn length_while_halted_sets_internal_error() {
        let cfg = DeviceConfig::default();
        let (mut sim, _mem) = SimAccelerator::new(&cfg, 0, 16);
        sim.write32(cfg.dma_offset + dma::MM2S_LENGTH, 4).unwrap();
        let status = sim.read32(cfg.dma_offset + dma::MM2S_DMASR).unwrap();
        assert_ne!(status & dma::status::DMA_INT_ERR, 0);
        assert!(sim.transfers().is_empty());
    }

    #[test]
    fn buffer_writes_share_the_register_log() {
        let cfg = DeviceConfig::default();
        let (mut sim, mut mem) = SimAccelerator::new(&cfg, 0, 16);
        mem.write_bytes(0, &[0xFF; 8]).unwrap();
        sim.write32(counter::RESET, 1).unwrap();
        assert_eq!(
            sim.log(),
            vec![
                RegisterAccess::BufferWrite { offset: 0, len: 8 },
                RegisterAccess::Write {
                    offset: counter::RESET,
                    value: 1
                },
            ]
        );
    }

    #[test]
    fn memory_bounds_checked() {
        let mut mem = SimMemory::new(8);
        assert!(mem.write_bytes(4, &[1, 2, 3, 4]).is_ok());
        assert!(mem.write_bytes(6, &[1, 2, 3]).is_err());
        assert_eq!(mem.snapshot()[4..8], [1, 2, 3, 4]);
    }
}
