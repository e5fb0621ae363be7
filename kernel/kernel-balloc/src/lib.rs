//! # Boot-Time Physical Memory Range Allocator
//!
//! The allocator that hands out physical memory during early bring-up,
//! after the boot loader's handoff and before any general-purpose heap
//! exists. Later subsystems (page-table bootstrap, the page-frame database)
//! draw their backing memory from here.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 BootAllocator ([`balloc`])          │
//! │    • setup from the boot layout                     │
//! │    • aligned window allocation, release             │
//! └───────────────┬─────────────────────────────────────┘
//!                 │ owns `known` + `free`
//! ┌───────────────▼─────────────────────────────────────┐
//! │                 RangeSet ([`range_set`])            │
//! │    • disjoint, non-adjacent `[begin, end)` ranges   │
//! │    • merge-insert and carve-out mutators            │
//! └───────────────┬─────────────────────────────────────┘
//!                 │ nodes drawn from
//! ┌───────────────▼─────────────────────────────────────┐
//! │                 NodePool ([`node_pool`])            │
//! │    • fixed-capacity arena, intrusive free list      │
//! │    • zero dynamic allocation                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Execution Model
//!
//! Single-threaded and non-reentrant: this code runs strictly during early
//! boot, before interrupts or a scheduler exist. Nothing here locks; a port
//! to a concurrent context must wrap every public entry point in external
//! mutual exclusion.
//!
//! No heap is available this early, so every structure lives in fixed-size
//! storage and the whole allocator is `const`-constructible.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod balloc;
pub mod node_pool;
pub mod range_set;

/// Align `value` upwards to `align` (must be a power of two).
///
/// Returns `None` when the aligned value does not fit in a `u64`. Memory
/// maps do report ranges reaching the top of the address space, so the
/// overflow case is reachable with valid input.
#[inline]
#[must_use]
pub const fn align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(bumped) => Some(bumped & !(align - 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::align_up;

    #[test]
    fn align_up_rounds_to_the_next_boundary() {
        assert_eq!(align_up(0, 16), Some(0));
        assert_eq!(align_up(1, 16), Some(16));
        assert_eq!(align_up(16, 16), Some(16));
        assert_eq!(align_up(0x1001, 0x1000), Some(0x2000));
        assert_eq!(align_up(7, 1), Some(7));
    }

    #[test]
    fn align_up_past_the_address_space_is_none() {
        assert_eq!(align_up(u64::MAX - 5, 16), None);
        assert_eq!(align_up(u64::MAX, 1), Some(u64::MAX));
        assert_eq!(align_up(u64::MAX & !0xf, 16), Some(u64::MAX & !0xf));
    }
}
