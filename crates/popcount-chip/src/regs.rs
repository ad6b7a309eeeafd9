// SPDX-License-Identifier: AGPL-3.0-only

//! Register map for the popcount accelerator and its DMA engine.
//!
//! All registers are 32-bit, little-endian, and must be accessed with
//! volatile loads/stores. Counter offsets are relative to the UIO window
//! base; DMA offsets are relative to the DMA block base
//! ([`crate::layout::DMA_OFFSET`] by default).
//!
//! DMA offsets and bit positions follow the AXI DMA v7.1 LogiCORE product
//! guide (PG021), "Direct Register Mode (Simple DMA)", MM2S channel only.
//!
//! ```text
//! 0x0000          COUNTER_RESET   W    non-zero clears the accumulator
//! 0x0004          COUNTER_VALUE   R/W  read: accumulator; write: feed one word
//! DMA + 0x00      MM2S_DMACR      R/W  run/stop, soft reset
//! DMA + 0x04      MM2S_DMASR      R/W  halted/idle/error bits, W1C irq bits
//! DMA + 0x18      MM2S_SA         W    source physical address (low 32 bits)
//! DMA + 0x28      MM2S_LENGTH     W    byte count; the write starts the transfer
//! ```

// ── Popcount counter ─────────────────────────────────────────────────────────

/// Counter registers of the popcount IP (AXI-Lite slave).
pub mod counter {
    /// Reset register. Writing a non-zero value zeroes the accumulator.
    pub const RESET: usize = 0x0000;
    /// Accumulator register.
    ///
    /// Reads return the running count. Writes feed one value through the
    /// counter (programmed-I/O mode).
    pub const VALUE: usize = 0x0004;
    /// Value written to [`RESET`] to pulse the reset line.
    pub const RESET_PULSE: u32 = 0x1;
}

// ── AXI DMA, MM2S channel ────────────────────────────────────────────────────

/// MM2S (memory-map to stream) channel registers, relative to the DMA base.
pub mod dma {
    /// MM2S DMA control register.
    pub const MM2S_DMACR: usize = 0x00;
    /// MM2S DMA status register.
    pub const MM2S_DMASR: usize = 0x04;
    /// MM2S source address, low 32 bits.
    pub const MM2S_SA: usize = 0x18;
    /// MM2S transfer length in bytes. Writing a non-zero value starts the transfer.
    pub const MM2S_LENGTH: usize = 0x28;

    /// `MM2S_DMACR` bit definitions.
    pub mod control {
        /// Run/stop. 1 = run, 0 = stop after outstanding transfers.
        pub const RUN_STOP: u32 = 1 << 0;
        /// Soft reset of the whole DMA core.
        pub const RESET: u32 = 1 << 2;
    }

    /// `MM2S_DMASR` bit definitions.
    pub mod status {
        /// Channel halted. Deasserts once `RUN_STOP` has taken effect.
        pub const HALTED: u32 = 1 << 0;
        /// Channel idle. Asserts when the programmed length has been transferred.
        pub const IDLE: u32 = 1 << 1;
        /// Internal error (e.g. zero length written).
        pub const DMA_INT_ERR: u32 = 1 << 4;
        /// AXI slave error on the memory-map side.
        pub const DMA_SLV_ERR: u32 = 1 << 5;
        /// AXI decode error (source address not decodable).
        pub const DMA_DEC_ERR: u32 = 1 << 6;
        /// Interrupt on complete. Write 1 to clear.
        pub const IOC_IRQ: u32 = 1 << 12;
        /// Error interrupt. Write 1 to clear.
        pub const ERR_IRQ: u32 = 1 << 14;

        /// Any bit that means the last transfer failed.
        pub const ERROR_MASK: u32 = DMA_INT_ERR | DMA_SLV_ERR | DMA_DEC_ERR;
    }
}
