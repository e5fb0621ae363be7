//! # Range Node Pool
//!
//! Fixed-capacity backing storage for [`RangeSet`](crate::range_set::RangeSet)
//! nodes. No heap exists when this code runs, so every tree node comes from
//! a statically sized arena and returns to it when erased.
//!
//! Unused slots form an intrusive free list threaded through the `left`
//! link, the same trick the heap allocator later plays with its free
//! blocks. A slot is either on the free list or linked into exactly one
//! tree, never both; debug builds assert this on every access.

/// Sentinel node index meaning "no node".
pub(crate) const NIL: usize = usize::MAX;

/// Default pool capacity.
///
/// Sized for the worst fragmentation a firmware memory map plus early
/// allocations are expected to produce on supported platforms.
pub const MAX_RANGES: usize = 128;

/// One interval slot: a `[begin, end)` range plus its tree links.
#[derive(Clone, Copy)]
pub(crate) struct Node {
    pub(crate) begin: u64,
    pub(crate) end: u64,
    /// Left child while linked; next free slot while on the free list.
    pub(crate) left: usize,
    pub(crate) right: usize,
    pub(crate) height: i8,
    in_use: bool,
}

impl Node {
    const UNUSED: Self = Self {
        begin: 0,
        end: 0,
        left: NIL,
        right: NIL,
        height: 0,
        in_use: false,
    };
}

/// Fixed arena of `N` range-node slots with an intrusive free list.
///
/// ### Invariants
/// - Nodes linked into trees plus nodes on the free list always total `N`.
/// - A released node must not be touched until re-acquired.
pub struct NodePool<const N: usize = MAX_RANGES> {
    slots: [Node; N],
    free_head: usize,
    free_len: usize,
}

impl<const N: usize> NodePool<N> {
    /// A pool with every slot on the free list.
    #[must_use]
    pub const fn new() -> Self {
        let mut slots = [Node::UNUSED; N];
        let mut i = 0;
        while i < N {
            slots[i].left = if i + 1 < N { i + 1 } else { NIL };
            i += 1;
        }
        Self {
            slots,
            free_head: if N == 0 { NIL } else { 0 },
            free_len: N,
        }
    }

    /// Slots not currently linked into any set.
    #[inline]
    #[must_use]
    pub const fn available(&self) -> usize {
        self.free_len
    }

    /// Total slot count.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Take a slot off the free list, initialized to `[begin, end)`.
    ///
    /// Exhaustion is fatal: there is no fallback once the pool is sized for
    /// the platform, and silently dropping a range would corrupt the
    /// physical-memory model.
    pub(crate) fn acquire(&mut self, begin: u64, end: u64) -> usize {
        assert!(
            self.free_head != NIL,
            "range node pool exhausted; increase the pool capacity"
        );
        let id = self.free_head;
        self.free_head = self.slots[id].left;
        self.free_len -= 1;
        self.slots[id] = Node {
            begin,
            end,
            left: NIL,
            right: NIL,
            height: 1,
            in_use: true,
        };
        id
    }

    /// Return an unlinked node to the free list.
    pub(crate) fn release(&mut self, id: usize) {
        debug_assert!(self.slots[id].in_use, "released a node twice");
        self.slots[id].in_use = false;
        self.slots[id].left = self.free_head;
        self.free_head = id;
        self.free_len += 1;
    }

    pub(crate) fn node(&self, id: usize) -> &Node {
        let node = &self.slots[id];
        debug_assert!(node.in_use, "accessed a released node");
        node
    }

    pub(crate) fn node_mut(&mut self, id: usize) -> &mut Node {
        let node = &mut self.slots[id];
        debug_assert!(node.in_use, "accessed a released node");
        node
    }
}

impl<const N: usize> Default for NodePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_keep_the_accounting_balanced() {
        let mut pool = NodePool::<4>::new();
        assert_eq!(pool.available(), 4);
        assert_eq!(pool.capacity(), 4);

        let a = pool.acquire(0, 10);
        let b = pool.acquire(20, 30);
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.node(a).begin, 0);
        assert_eq!(pool.node(b).end, 30);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn released_slots_are_reissued() {
        let mut pool = NodePool::<2>::new();
        let a = pool.acquire(0, 1);
        let b = pool.acquire(1, 2);
        pool.release(a);
        pool.release(b);
        // Slot identity is unspecified; only that both come back.
        let c = pool.acquire(2, 3);
        let d = pool.acquire(3, 4);
        assert_eq!(pool.available(), 0);
        assert_ne!(c, d);
    }

    #[test]
    #[should_panic(expected = "range node pool exhausted")]
    fn exhaustion_is_fatal() {
        let mut pool = NodePool::<1>::new();
        let _a = pool.acquire(0, 1);
        let _b = pool.acquire(1, 2);
    }
}
