// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the AXI popcount accelerator block design.
//!
//! This crate has **no dependencies** and **no hardware access**; it is a
//! pure model of the programmable-logic side: register offsets, status and
//! control bit definitions, the UIO window layout, and the u-dma-buf sysfs
//! names the host uses to locate its DMA buffer.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Counter registers and AXI DMA MM2S register map, bit definitions |
//! | [`layout`] | UIO window size, DMA block offset, transfer limit, device paths |
//!
//! ```text
//!  UIO window (/dev/uio0, 64 KB)
//!  ┌────────────────────────────┐ 0x0000
//!  │ popcount: RESET, COUNT     │
//!  ├────────────────────────────┤ 0x1000
//!  │ AXI DMA MM2S channel       │──▶ reads u-dma-buf ──▶ AXI-Stream ──▶ popcount
//!  └────────────────────────────┘ 0xFFFF
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod layout;
pub mod regs;
