//! # Firmware Memory Map View
//!
//! A read-only, bounds-checked view over the raw memory-map entry buffer
//! reported through the multiboot information block.
//!
//! ## ABI
//!
//! Each entry is packed with no implicit padding:
//!
//! | Offset | Width | Field    |
//! |--------|-------|----------|
//! | 0      | 4     | `size`   |
//! | 4      | 8     | `addr`   |
//! | 12     | 8     | `length` |
//! | 20     | 4     | `type`   |
//!
//! `size` counts the bytes *after* itself, so consecutive entries are
//! `size + 4` bytes apart. Firmware is free to report overlapping entries
//! with conflicting types; this module only decodes, it does not reconcile.

use crate::PhysRange;
use crate::raw::{read_u32, read_u64};

/// Raw multiboot region type denoting usable RAM.
const TYPE_AVAILABLE: u32 = 1;

/// Smallest well-formed stride: the four fields above.
const ENTRY_MIN_LEN: usize = 24;

/// Classification of one reported memory region.
///
/// Only type 1 means usable RAM. Every other value — ACPI data, ACPI NVS,
/// defective, or anything a future firmware invents — must be kept away
/// from the allocator, so it is preserved raw rather than enumerated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegionKind {
    /// Usable RAM.
    Available,
    /// Anything else; the raw type value is kept for diagnostics.
    Other(u32),
}

impl RegionKind {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        if raw == TYPE_AVAILABLE {
            Self::Available
        } else {
            Self::Other(raw)
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }
}

/// One decoded memory-map entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Physical start address.
    pub addr: u64,
    /// Length in bytes.
    pub length: u64,
    /// What the firmware says lives there.
    pub kind: RegionKind,
}

impl MemoryRegion {
    /// The region as a [`PhysRange`], or `None` if it covers no bytes.
    ///
    /// An `addr + length` sum past the address space saturates at
    /// `u64::MAX`; firmware has been known to report such entries.
    #[must_use]
    pub fn phys_range(&self) -> Option<PhysRange> {
        let end = self.addr.saturating_add(self.length);
        if end == self.addr {
            return None;
        }
        Some(PhysRange::new(self.addr, end))
    }
}

/// Read-only view over the raw memory-map entry buffer.
#[derive(Debug, Copy, Clone)]
pub struct MemoryMap<'a> {
    bytes: &'a [u8],
}

impl<'a> MemoryMap<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Iterate over the decoded entries.
    ///
    /// Iteration ends early at a truncated trailing entry or a nonsensical
    /// `size` field; whatever decoded cleanly up to that point is yielded.
    #[must_use]
    pub const fn iter(&self) -> Regions<'a> {
        Regions {
            bytes: self.bytes,
            offset: 0,
        }
    }
}

impl<'a> IntoIterator for MemoryMap<'a> {
    type Item = MemoryRegion;
    type IntoIter = Regions<'a>;

    fn into_iter(self) -> Regions<'a> {
        self.iter()
    }
}

impl<'a> IntoIterator for &MemoryMap<'a> {
    type Item = MemoryRegion;
    type IntoIter = Regions<'a>;

    fn into_iter(self) -> Regions<'a> {
        self.iter()
    }
}

/// Iterator over the entries of a [`MemoryMap`].
#[derive(Debug, Clone)]
pub struct Regions<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl Iterator for Regions<'_> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<MemoryRegion> {
        let size = read_u32(self.bytes, self.offset)?;
        let stride = usize::try_from(u64::from(size) + 4).ok()?;
        if stride < ENTRY_MIN_LEN {
            // A size this small means the buffer is corrupt; do not try to
            // resynchronize on garbage.
            return None;
        }
        let addr = read_u64(self.bytes, self.offset.checked_add(4)?)?;
        let length = read_u64(self.bytes, self.offset.checked_add(12)?)?;
        let raw_kind = read_u32(self.bytes, self.offset.checked_add(20)?)?;
        self.offset = self.offset.saturating_add(stride);
        Some(MemoryRegion {
            addr,
            length,
            kind: RegionKind::from_raw(raw_kind),
        })
    }
}
