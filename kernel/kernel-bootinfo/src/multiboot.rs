//! # Multiboot Information Block
//!
//! Decodes the fixed header of the multiboot information block the boot
//! loader hands to the kernel. Only the fields this subsystem cares about
//! are read: the `flags` word and the physical placement of the memory-map
//! entry buffer.
//!
//! ## ABI
//!
//! The block is packed with no implicit padding. Offsets of the decoded
//! fields, in bytes from the start of the block:
//!
//! | Offset | Width | Field |
//! |--------|-------|----------------|
//! | 0      | 4     | `flags`        |
//! | 44     | 4     | `mmap_length`  |
//! | 48     | 4     | `mmap_addr`    |
//!
//! The memory-map fields are only valid when [`FLAG_MEMORY_MAP`] is set in
//! `flags`.

use crate::raw::read_u32;

/// `flags` bit indicating that `mmap_length`/`mmap_addr` are valid.
pub const FLAG_MEMORY_MAP: u32 = 1 << 6;

const FLAGS_OFFSET: usize = 0;
const MMAP_LENGTH_OFFSET: usize = 44;
const MMAP_ADDR_OFFSET: usize = 48;

/// Bytes covering every field decoded here.
const HEADER_LEN: usize = 52;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootInfoError {
    /// The info block is smaller than its fixed header.
    #[error("boot info block truncated at {0} bytes")]
    Truncated(usize),
    /// The boot loader did not hand over a memory map (`flags` bit 6 clear).
    #[error("boot loader did not provide a memory map")]
    MissingMemoryMap,
}

/// Decoded multiboot information header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MultibootInfo {
    flags: u32,
    mmap_addr: u32,
    mmap_length: u32,
}

impl MultibootInfo {
    /// Decode the fixed header fields from the raw info block.
    ///
    /// # Errors
    /// [`BootInfoError::Truncated`] if `bytes` is shorter than the fixed
    /// header.
    pub fn parse(bytes: &[u8]) -> Result<Self, BootInfoError> {
        let truncated = BootInfoError::Truncated(bytes.len());
        if bytes.len() < HEADER_LEN {
            return Err(truncated);
        }
        Ok(Self {
            flags: read_u32(bytes, FLAGS_OFFSET).ok_or(truncated)?,
            mmap_addr: read_u32(bytes, MMAP_ADDR_OFFSET).ok_or(truncated)?,
            mmap_length: read_u32(bytes, MMAP_LENGTH_OFFSET).ok_or(truncated)?,
        })
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    /// Physical placement of the memory-map entry buffer.
    ///
    /// # Errors
    /// [`BootInfoError::MissingMemoryMap`] if the loader did not set
    /// [`FLAG_MEMORY_MAP`].
    pub fn memory_map_location(&self) -> Result<MemoryMapLocation, BootInfoError> {
        if self.flags & FLAG_MEMORY_MAP == 0 {
            return Err(BootInfoError::MissingMemoryMap);
        }
        Ok(MemoryMapLocation {
            addr: u64::from(self.mmap_addr),
            length: u64::from(self.mmap_length),
        })
    }
}

/// Where the boot loader placed the memory-map entry buffer.
///
/// The platform glue maps `addr` and hands the resulting `length`-byte slice
/// to [`MemoryMap::new`](crate::memory_map::MemoryMap::new).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryMapLocation {
    /// Physical address of the first entry.
    pub addr: u64,
    /// Length of the entry buffer in bytes.
    pub length: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_block(flags: u32, mmap_length: u32, mmap_addr: u32) -> [u8; HEADER_LEN] {
        let mut bytes = [0_u8; HEADER_LEN];
        bytes[FLAGS_OFFSET..FLAGS_OFFSET + 4].copy_from_slice(&flags.to_le_bytes());
        bytes[MMAP_LENGTH_OFFSET..MMAP_LENGTH_OFFSET + 4]
            .copy_from_slice(&mmap_length.to_le_bytes());
        bytes[MMAP_ADDR_OFFSET..MMAP_ADDR_OFFSET + 4].copy_from_slice(&mmap_addr.to_le_bytes());
        bytes
    }

    #[test]
    fn decodes_memory_map_location() {
        let bytes = info_block(FLAG_MEMORY_MAP, 0x90, 0x0001_0000);
        let info = MultibootInfo::parse(&bytes).unwrap();
        assert_eq!(info.flags(), FLAG_MEMORY_MAP);
        let location = info.memory_map_location().unwrap();
        assert_eq!(location.addr, 0x0001_0000);
        assert_eq!(location.length, 0x90);
    }

    #[test]
    fn rejects_truncated_block() {
        let bytes = info_block(FLAG_MEMORY_MAP, 0x90, 0x0001_0000);
        assert_eq!(
            MultibootInfo::parse(&bytes[..HEADER_LEN - 1]),
            Err(BootInfoError::Truncated(HEADER_LEN - 1))
        );
    }

    #[test]
    fn layout_construction_enforces_the_memory_map_flag() {
        use crate::{BootLayout, PhysRange};

        let no_map = info_block(0, 0, 0);
        let info = MultibootInfo::parse(&no_map).unwrap();
        let layout = BootLayout::from_multiboot(&info, &[], PhysRange::empty(), PhysRange::empty());
        assert!(matches!(layout, Err(BootInfoError::MissingMemoryMap)));

        let with_map = info_block(FLAG_MEMORY_MAP, 0x90, 0x0001_0000);
        let info = MultibootInfo::parse(&with_map).unwrap();
        let layout = BootLayout::from_multiboot(&info, &[], PhysRange::empty(), PhysRange::empty());
        assert!(layout.is_ok());
    }

    #[test]
    fn rejects_missing_memory_map_flag() {
        let bytes = info_block(!FLAG_MEMORY_MAP, 0x90, 0x0001_0000);
        let info = MultibootInfo::parse(&bytes).unwrap();
        assert_eq!(
            info.memory_map_location(),
            Err(BootInfoError::MissingMemoryMap)
        );
    }
}
