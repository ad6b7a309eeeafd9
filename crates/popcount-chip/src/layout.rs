// SPDX-License-Identifier: AGPL-3.0-only

//! Address-space layout and host resource names.
//!
//! Values come from the Vivado block design's address map and the AXI DMA
//! IP configuration; the device paths are those created by the `uio_pdrv_genirq`
//! and `u-dma-buf` kernel modules on the board image.
//!
//! ```text
//! Resource                              Size       Purpose
//! ───────────────────────────────────── ────────── ────────────────────────────
//! /dev/uio0                             64 KB      popcount + DMA registers
//! /dev/udmabuf0                         (sysfs)    DMA-capable source buffer
//! /sys/class/u-dma-buf/udmabuf0/phys_addr          hex physical address
//! /sys/class/u-dma-buf/udmabuf0/size               decimal byte size
//! ```

/// UIO device exposing the control/status window.
pub const UIO_DEVICE: &str = "/dev/uio0";

/// Size of the UIO window (`/sys/class/uio/uio0/maps/map0/size`).
pub const UIO_MAP_SIZE: usize = 0x0001_0000;

/// Offset of the AXI DMA register block inside the UIO window.
pub const DMA_OFFSET: usize = 0x0000_1000;

/// Largest single MM2S transfer the DMA IP is configured for (256-beat bursts × 32).
pub const DMA_MAX_TRANSFER: usize = 256 * 32;

/// Natural transfer granularity of the stream (one 32-bit beat).
pub const STREAM_BEAT_BYTES: usize = 4;

/// u-dma-buf character device backing the DMA buffer.
pub const UDMABUF_DEVICE: &str = "/dev/udmabuf0";

/// sysfs directory carrying the u-dma-buf attributes.
pub const UDMABUF_SYSFS: &str = "/sys/class/u-dma-buf/udmabuf0";

/// Attribute holding the buffer's physical address (hexadecimal).
pub const UDMABUF_PHYS_ADDR_ATTR: &str = "phys_addr";

/// Attribute holding the buffer's size in bytes (decimal).
pub const UDMABUF_SIZE_ATTR: &str = "size";
