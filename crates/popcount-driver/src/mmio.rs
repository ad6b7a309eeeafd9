//! Memory-mapped device regions
//!
//! Both resources the driver needs (the UIO register window and the
//! u-dma-buf data buffer) are character devices that support `mmap`.
//! [`MappedRegion`] owns one such mapping: it is created by [`MappedRegion::open`],
//! every access is bounds-checked, and `Drop` unmaps it exactly once.
//!
//! The [`RegisterIo`] and [`DmaMemory`] traits are the seams the register
//! protocol and the transfer loop are written against, so the same code runs
//! over a real mapping or over a simulated device.
//!
//! # Unsafe surface
//!
//! `mmap`/`munmap` (via `rustix`), volatile 32-bit loads/stores, and one
//! `copy_nonoverlapping` per bulk copy. Nothing else in the crate touches
//! raw pointers.

use crate::error::{PopcountError, Result};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// 32-bit register access over some window
///
/// Offsets are byte offsets from the window base and must be word aligned.
pub trait RegisterIo {
    /// Volatile 32-bit read.
    ///
    /// # Errors
    ///
    /// Returns error if the offset is misaligned or outside the window.
    fn read32(&self, offset: usize) -> Result<u32>;

    /// Volatile 32-bit write.
    ///
    /// # Errors
    ///
    /// Returns error if the offset is misaligned or outside the window.
    fn write32(&mut self, offset: usize, value: u32) -> Result<()>;
}

/// Host-writable memory that a DMA engine reads from
pub trait DmaMemory {
    /// Usable size in bytes.
    fn capacity(&self) -> usize;

    /// Copy `data` into the buffer at `offset`.
    ///
    /// # Errors
    ///
    /// Returns error if the write would exceed the buffer.
    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()>;
}

/// Requested protection for a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read-only mapping
    ReadOnly,
    /// Read-write mapping
    ReadWrite,
}

impl Access {
    fn prot(self) -> ProtFlags {
        match self {
            Self::ReadOnly => ProtFlags::READ,
            Self::ReadWrite => ProtFlags::READ | ProtFlags::WRITE,
        }
    }
}

/// A device resource mapped into the process address space
#[derive(Debug)]
pub struct MappedRegion {
    ptr: NonNull<u8>,
    size: usize,
    access: Access,
    resource: PathBuf,
}

impl MappedRegion {
    /// Open `resource` and map its first `size` bytes.
    ///
    /// The device is opened with `O_SYNC` so the kernel maps it uncached.
    /// The file descriptor is closed as soon as the mapping exists; the
    /// mapping itself stays valid until this value is dropped.
    ///
    /// # Errors
    ///
    /// - `ResourceUnavailable` if the resource cannot be opened
    /// - `MappingFailed` if `size` is zero, larger than a regular backing
    ///   file, or rejected by `mmap`
    pub fn open(resource: &Path, size: usize, access: Access) -> Result<Self> {
        if size == 0 {
            return Err(PopcountError::mapping_failed(resource, "zero-length mapping"));
        }

        tracing::debug!("Mapping {} ({size:#x} bytes, {access:?})", resource.display());

        let file = OpenOptions::new()
            .read(true)
            .write(access == Access::ReadWrite)
            .custom_flags(libc::O_SYNC)
            .open(resource)
            .map_err(|e| PopcountError::resource_unavailable(resource, e.to_string()))?;

        // Character devices report a length of 0; only regular files can be
        // checked up front. Mapping past the end of a file would SIGBUS on access.
        let metadata = file
            .metadata()
            .map_err(|e| PopcountError::resource_unavailable(resource, e.to_string()))?;
        if metadata.is_file() && !backing_covers(metadata.len(), size) {
            return Err(PopcountError::mapping_failed(
                resource,
                format!("size mismatch: requested {size:#x}, resource has {:#x}", metadata.len()),
            ));
        }

        // SAFETY: mmap is unsafe but we validate all preconditions:
        // - File descriptor is valid (just opened via OpenOptions)
        // - Size is non-zero (checked above)
        // - Protection matches how the file was opened
        // - MAP_SHARED so writes reach the device and the device's writes are visible
        // - Offset is 0 (start of the resource)
        // - rustix returns Result, so a rejected mapping becomes an Err
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                access.prot(),
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| PopcountError::mapping_failed(resource, format!("mmap failed: {e}")))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| PopcountError::mapping_failed(resource, "mmap returned null"))?;

        drop(file);

        tracing::info!("Mapped {} at {ptr:p}, size={size:#x}", resource.display());

        Ok(Self {
            ptr,
            size,
            access,
            resource: resource.to_path_buf(),
        })
    }

    /// Get region size
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Get the path this region was mapped from
    #[must_use]
    pub fn resource(&self) -> &Path {
        &self.resource
    }

    /// Read bytes at offset
    ///
    /// # Errors
    ///
    /// Returns error if read would exceed bounds
    pub fn read_bytes(&self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        self.check_range(offset, buffer.len())?;

        // SAFETY: range checked above, so src..src+len lies inside the mapping.
        // dst is a distinct user slice, so the two do not overlap; u8 has alignment 1.
        unsafe {
            let src = self.ptr.as_ptr().add(offset);
            std::ptr::copy_nonoverlapping(src, buffer.as_mut_ptr(), buffer.len());
        }
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(PopcountError::OutOfBounds {
                offset,
                len,
                limit: self.size,
            }),
        }
    }

    fn check_register(&self, offset: usize) -> Result<()> {
        if offset % 4 != 0 {
            return Err(PopcountError::Misaligned { offset });
        }
        self.check_range(offset, 4)
    }

    fn check_writable(&self) -> Result<()> {
        if self.access == Access::ReadOnly {
            return Err(PopcountError::mapping_failed(
                &self.resource,
                "write to read-only mapping",
            ));
        }
        Ok(())
    }
}

impl RegisterIo for MappedRegion {
    fn read32(&self, offset: usize) -> Result<u32> {
        self.check_register(offset)?;

        // SAFETY: Volatile read from a memory-mapped hardware register.
        // - offset + 4 <= size and offset is word aligned (checked above)
        // - ptr is page aligned (from mmap), so ptr + offset is u32 aligned
        // - read_volatile keeps the compiler from merging or eliding status polls
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };

        tracing::trace!("Read u32 @ {offset:#x} = {value:#x}");
        Ok(value)
    }

    fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check_register(offset)?;
        self.check_writable()?;

        tracing::trace!("Write u32 @ {offset:#x} = {value:#x}");

        // SAFETY: Volatile write to a memory-mapped hardware register.
        // - offset + 4 <= size and offset is word aligned (checked above)
        // - mapping is writable (checked above)
        // - write_volatile keeps register writes in program order
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }
        Ok(())
    }
}

impl DmaMemory for MappedRegion {
    fn capacity(&self) -> usize {
        self.size
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        self.check_writable()?;

        // SAFETY: range checked above, so dst..dst+len lies inside the mapping.
        // src is a distinct user slice, so the two do not overlap; u8 has alignment 1.
        unsafe {
            let dst = self.ptr.as_ptr().add(offset);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }
}

/// Whether a backing file of `file_len` bytes holds a `size`-byte mapping.
/// Lengths beyond the address space saturate instead of wrapping.
fn backing_covers(file_len: u64, size: usize) -> bool {
    usize::try_from(file_len).unwrap_or(usize::MAX) >= size
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {} ({:#x} bytes)", self.resource.display(), self.size);

        // SAFETY: ptr and size are exactly what mmap returned/was given in open(),
        // and Drop runs once, so the range is still mapped and no borrow outlives it.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap of {} failed during drop: {e}", self.resource.display());
            }
        }
    }
}

// SAFETY: MappedRegion owns its mapping exclusively; moving it to another
// thread does not invalidate a process-wide mapping.
unsafe impl Send for MappedRegion {}
