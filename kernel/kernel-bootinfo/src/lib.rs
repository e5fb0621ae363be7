//! # Boot Handoff Views
//!
//! Read-only views over the data the boot loader leaves behind for the
//! kernel: the firmware memory map, the loaded kernel image bounds, and the
//! boot module (initramfs) placement.
//!
//! Everything here decodes raw byte buffers with explicit field offsets and
//! bounds checks; nothing is dereferenced blindly and nothing allocates.
//! Turning the physical addresses from the handoff into byte slices is the
//! platform glue's job — these types only interpret buffers they are given.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_bootinfo::{BootLayout, PhysRange, memory_map::MemoryMap};
//! # let mmap_buffer: &[u8] = &[];
//! let layout = BootLayout {
//!     memory_map: MemoryMap::new(mmap_buffer),
//!     kernel_image: PhysRange::new(0x0010_0000, 0x0040_0000),
//!     boot_module: PhysRange::empty(),
//! };
//! # let _ = layout;
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory_map;
pub mod multiboot;

mod raw;

use crate::memory_map::MemoryMap;
use crate::multiboot::{BootInfoError, MultibootInfo};
use core::fmt;

/// Half-open range `[begin, end)` of physical addresses.
///
/// A thin pair of `u64` offsets that carries intent: both endpoints are
/// physical. `Display` prints the range in the diagnostic form used by the
/// boot allocator's dump, `0x<begin>-0x<end>`.
///
/// ### Invariants
/// - `begin <= end`; `begin == end` denotes the empty range.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysRange {
    /// First address covered by the range.
    pub begin: u64,
    /// First address past the range.
    pub end: u64,
}

impl PhysRange {
    #[inline]
    #[must_use]
    pub const fn new(begin: u64, end: u64) -> Self {
        debug_assert!(begin <= end, "inverted physical range");
        Self { begin, end }
    }

    /// The empty range at address zero.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self { begin: 0, end: 0 }
    }

    /// Number of bytes covered.
    #[inline]
    #[must_use]
    pub const fn len(self) -> u64 {
        self.end - self.begin
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.begin == self.end
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, addr: u64) -> bool {
        addr >= self.begin && addr < self.end
    }
}

impl fmt::Debug for PhysRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysRange(0x{:x}-0x{:x})", self.begin, self.end)
    }
}

impl fmt::Display for PhysRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}-0x{:x}", self.begin, self.end)
    }
}

/// Everything the boot allocator needs to know about the machine, bundled.
///
/// The memory map comes from the firmware via the boot loader; the kernel
/// image bounds come from the link layout (`text` start through `bss` end);
/// the boot module is the initramfs image the loader placed in memory. An
/// empty [`PhysRange`] for the module means no module was loaded.
#[derive(Copy, Clone)]
pub struct BootLayout<'a> {
    /// View over the raw firmware memory-map entries.
    pub memory_map: MemoryMap<'a>,
    /// Physical footprint of the running kernel image.
    pub kernel_image: PhysRange,
    /// Physical footprint of the boot-loaded module, if any.
    pub boot_module: PhysRange,
}

impl<'a> BootLayout<'a> {
    /// Build the layout from a decoded multiboot header and the mapped
    /// memory-map entry buffer.
    ///
    /// This is the intended construction path: it refuses to trust
    /// `mmap_bytes` unless the header says the loader actually handed a
    /// memory map over. The platform glue maps the buffer named by
    /// [`MultibootInfo::memory_map_location`] and passes the resulting
    /// slice in.
    ///
    /// # Errors
    /// [`BootInfoError::MissingMemoryMap`] if the header's memory-map flag
    /// is clear.
    pub fn from_multiboot(
        info: &MultibootInfo,
        mmap_bytes: &'a [u8],
        kernel_image: PhysRange,
        boot_module: PhysRange,
    ) -> Result<Self, BootInfoError> {
        info.memory_map_location()?;
        Ok(Self {
            memory_map: MemoryMap::new(mmap_bytes),
            kernel_image,
            boot_module,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phys_range_accessors() {
        let r = PhysRange::new(0x1000, 0x3000);
        assert_eq!(r.len(), 0x2000);
        assert!(!r.is_empty());
        assert!(r.contains(0x1000));
        assert!(r.contains(0x2fff));
        assert!(!r.contains(0x3000));
        assert!(PhysRange::empty().is_empty());
    }

    #[test]
    fn phys_range_display_matches_dump_format() {
        let r = PhysRange::new(0x0, 0x0010_0000);
        assert_eq!(format!("{r}"), "0x0-0x100000");
    }
}
