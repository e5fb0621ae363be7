//! # Boot Allocator
//!
//! Ties the node pool and the two interval sets together behind the four
//! public operations the rest of early boot uses: `setup`, `alloc`, `free`
//! and `memory_upper_bound`.

use crate::align_up;
use crate::node_pool::{MAX_RANGES, NIL, NodePool};
use crate::range_set::{RangeSet, Ranges};
use kernel_bootinfo::BootLayout;
use log::{debug, info};

/// Physical-memory range allocator for early kernel bring-up.
///
/// Tracks two interval sets over one shared node pool:
///
/// - `known` — every byte of memory the firmware ever reported, plus the
///   kernel image. Never shrinks.
/// - `free` — the currently unallocated subset of `known`.
///
/// The capacity parameter bounds fragmentation; the default matches the
/// worst case expected from supported firmware. `new` is `const`, so a
/// platform whose boot model needs ambient state can still park one of
/// these in a `static`.
pub struct BootAllocator<const RANGES: usize = MAX_RANGES> {
    pool: NodePool<RANGES>,
    known: RangeSet,
    free: RangeSet,
}

impl<const RANGES: usize> BootAllocator<RANGES> {
    /// An empty allocator; call [`setup`](Self::setup) before allocating.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pool: NodePool::new(),
            known: RangeSet::new(),
            free: RangeSet::new(),
        }
    }

    /// Ingest the boot layout and build the `known` and `free` sets.
    ///
    /// Every memory-map entry is first added to **both** sets regardless of
    /// type, and the non-available entries are subtracted from `free` in a
    /// second pass. Firmware has been seen reporting overlapping entries
    /// with conflicting types; seed-then-subtract guarantees that a byte
    /// ever marked non-available ends up excluded from `free` no matter
    /// how the overlaps interleave. The kernel image and the boot module
    /// are then carved out of `free` as well, and both sets are dumped to
    /// the log.
    ///
    /// # Panics
    /// If the map fragments memory into more ranges than the pool holds.
    pub fn setup(&mut self, layout: &BootLayout<'_>) {
        for region in layout.memory_map.iter() {
            let Some(range) = region.phys_range() else {
                continue;
            };
            self.known.add_range(&mut self.pool, range.begin, range.end);
            self.free.add_range(&mut self.pool, range.begin, range.end);
        }

        let image = layout.kernel_image;
        if !image.is_empty() {
            self.known.add_range(&mut self.pool, image.begin, image.end);
            self.free.add_range(&mut self.pool, image.begin, image.end);
        }

        for region in layout.memory_map.iter() {
            if region.kind.is_available() {
                continue;
            }
            let Some(range) = region.phys_range() else {
                continue;
            };
            debug!("excluding non-available region {range}");
            self.free.remove_range(&mut self.pool, range.begin, range.end);
        }

        let module = layout.boot_module;
        if !module.is_empty() {
            debug!("excluding boot module {module}");
            self.free.remove_range(&mut self.pool, module.begin, module.end);
        }
        if !image.is_empty() {
            debug!("excluding kernel image {image}");
            self.free.remove_range(&mut self.pool, image.begin, image.end);
        }

        self.dump_ranges();
    }

    /// Allocate `size` bytes at the given power-of-two alignment from the
    /// first free range with enough aligned room inside `[from, to)`.
    ///
    /// Returns the chosen address, or **`to` as the failure sentinel** —
    /// `to` can never be a valid allocation inside the window. Callers must
    /// compare the result against their own upper bound and must not pass
    /// a window where `to` would be ambiguous (such as `to == 0`).
    ///
    /// # Panics
    /// If the pool is exhausted while splitting the chosen range.
    pub fn alloc_aligned(&mut self, size: u64, align: u64, from: u64, to: u64) -> u64 {
        debug_assert!(size > 0, "zero-sized allocation");
        debug_assert!(align.is_power_of_two(), "alignment must be a power of two");

        let mut cursor = self.free.first_ending_after(&self.pool, from);
        while cursor != NIL {
            let node = *self.pool.node(cursor);
            if node.begin >= to {
                break;
            }

            // Clip the candidate to the request window, then align within.
            // Either step can run off the end of the address space; such a
            // candidate simply does not fit.
            let begin = node.begin.max(from);
            let end = node.end.min(to);
            if let Some(addr) = align_up(begin, align)
                && let Some(alloc_end) = addr.checked_add(size)
                && alloc_end <= end
            {
                self.free.detach(&mut self.pool, cursor);
                if node.begin < addr {
                    self.free.add_range(&mut self.pool, node.begin, addr);
                }
                if node.end > alloc_end {
                    self.free.add_range(&mut self.pool, alloc_end, node.end);
                }
                return addr;
            }

            cursor = self.free.successor_after(&self.pool, node.begin);
        }
        to
    }

    /// Allocate `size` bytes inside `[from, to)` with an alignment derived
    /// from the size.
    ///
    /// The only callers wanting more than natural alignment this early are
    /// allocating page tables, which pass an explicit alignment; for the
    /// small metadata objects everything else allocates, capping at 64
    /// bytes is a reasonable default.
    ///
    /// Failure is signalled by the `to` sentinel, as for
    /// [`alloc_aligned`](Self::alloc_aligned).
    ///
    /// # Panics
    /// If the pool is exhausted while splitting the chosen range.
    pub fn alloc(&mut self, size: u64, from: u64, to: u64) -> u64 {
        let mut align = 64;
        if size <= 32 {
            align = 32;
        }
        if size <= 16 {
            align = 16;
        }
        if size <= 8 {
            align = 8;
        }
        self.alloc_aligned(size, align, from, to)
    }

    /// Return `[begin, end)` to the free set.
    ///
    /// The range must have come from a prior allocation (or be otherwise
    /// known to be unused); nothing here detects a double release.
    ///
    /// # Panics
    /// If `begin >= end`, or if the pool is exhausted.
    pub fn free(&mut self, begin: u64, end: u64) {
        self.free.add_range(&mut self.pool, begin, end);
    }

    /// The lowest address above all reported physical memory, or 0 before
    /// [`setup`](Self::setup) has run.
    #[must_use]
    pub fn memory_upper_bound(&self) -> u64 {
        self.known.last(&self.pool).map_or(0, |range| range.end)
    }

    /// All memory ever reported, in ascending order.
    #[must_use]
    pub fn known_ranges(&self) -> Ranges<'_, RANGES> {
        self.known.ranges(&self.pool)
    }

    /// Currently unallocated memory, in ascending order.
    #[must_use]
    pub fn free_ranges(&self) -> Ranges<'_, RANGES> {
        self.free.ranges(&self.pool)
    }

    /// Log both interval sets, one `memory range:` line each.
    pub fn dump_ranges(&self) {
        info!("known memory ranges:");
        for range in self.known_ranges() {
            info!("memory range: {range}");
        }
        info!("free memory ranges:");
        for range in self.free_ranges() {
            info!("memory range: {range}");
        }
    }
}

impl<const RANGES: usize> Default for BootAllocator<RANGES> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(ranges: &[(u64, u64)]) -> BootAllocator {
        let mut balloc = BootAllocator::new();
        for &(begin, end) in ranges {
            balloc.free(begin, end);
        }
        balloc
    }

    fn free_list(balloc: &BootAllocator) -> Vec<(u64, u64)> {
        balloc.free_ranges().map(|r| (r.begin, r.end)).collect()
    }

    #[test]
    fn allocation_carves_out_the_front() {
        let mut balloc = filled(&[(0, 100)]);
        let addr = balloc.alloc_aligned(10, 16, 0, 100);
        assert_eq!(addr, 0);
        // No leading remainder; the trailing remainder starts right after
        // the 10 allocated bytes, not at the next alignment boundary.
        assert_eq!(free_list(&balloc), [(10, 100)]);
    }

    #[test]
    fn alignment_skips_an_unaligned_head() {
        let mut balloc = filled(&[(3, 100)]);
        let addr = balloc.alloc_aligned(10, 16, 0, 100);
        assert_eq!(addr, 16);
        assert_eq!(free_list(&balloc), [(3, 16), (26, 100)]);
    }

    #[test]
    fn window_is_honored_over_earlier_free_memory() {
        let mut balloc = filled(&[(0, 100), (200, 300)]);
        let addr = balloc.alloc_aligned(8, 8, 120, 300);
        assert_eq!(addr, 200);
        assert_eq!(free_list(&balloc), [(0, 100), (208, 300)]);
    }

    #[test]
    fn window_clipping_allocates_inside_a_larger_range() {
        let mut balloc = filled(&[(0, 0x1000)]);
        let addr = balloc.alloc_aligned(0x10, 0x10, 0x100, 0x200);
        assert_eq!(addr, 0x100);
        assert_eq!(free_list(&balloc), [(0, 0x100), (0x110, 0x1000)]);
    }

    #[test]
    fn failure_returns_the_window_end_and_changes_nothing() {
        let mut balloc = filled(&[(0, 100)]);
        let addr = balloc.alloc_aligned(200, 1, 0, 100);
        assert_eq!(addr, 100);
        assert_eq!(free_list(&balloc), [(0, 100)]);

        // A window past all free memory fails the same way.
        let addr = balloc.alloc_aligned(1, 1, 500, 600);
        assert_eq!(addr, 600);
        assert_eq!(free_list(&balloc), [(0, 100)]);
    }

    #[test]
    fn aligning_past_the_top_of_memory_fails_cleanly() {
        // A free range at the very top of the address space, as produced by
        // a saturated memory-map entry. Aligning its base past `u64::MAX`
        // must mean "does not fit", not wrap around.
        let mut balloc = filled(&[(u64::MAX - 0x1000, u64::MAX)]);
        let addr = balloc.alloc_aligned(16, 0x10000, 0, u64::MAX);
        assert_eq!(addr, u64::MAX);
        assert_eq!(free_list(&balloc), [(u64::MAX - 0x1000, u64::MAX)]);

        // An alignment the range can satisfy still succeeds up there.
        let addr = balloc.alloc_aligned(16, 0x100, 0, u64::MAX);
        assert_eq!(addr, 0xffff_ffff_ffff_f000);
    }

    #[test]
    fn a_tight_fit_consumes_the_whole_range() {
        let mut balloc = filled(&[(64, 128)]);
        let addr = balloc.alloc_aligned(64, 64, 0, 1000);
        assert_eq!(addr, 64);
        assert!(free_list(&balloc).is_empty());
    }

    #[test]
    fn size_derived_alignment_table() {
        for (size, expected_align) in [(1, 8), (8, 8), (9, 16), (16, 16), (17, 32), (33, 64)] {
            let mut balloc = filled(&[(1, 0x1000)]);
            let addr = balloc.alloc(size, 0, 0x1000);
            assert_eq!(
                addr, expected_align,
                "size {size} should allocate at alignment {expected_align}"
            );
        }
    }

    #[test]
    fn released_memory_is_allocatable_again() {
        let mut balloc = filled(&[(0, 100)]);
        let addr = balloc.alloc_aligned(50, 1, 0, 100);
        assert_eq!(addr, 0);
        assert_eq!(free_list(&balloc), [(50, 100)]);

        balloc.free(0, 50);
        assert_eq!(free_list(&balloc), [(0, 100)]);
    }

    #[test]
    fn upper_bound_is_zero_before_setup() {
        let balloc = BootAllocator::<16>::new();
        assert_eq!(balloc.memory_upper_bound(), 0);
    }
}
