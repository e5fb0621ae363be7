//! # Disjoint Interval Set
//!
//! An ordered collection of pairwise-disjoint, non-adjacent physical ranges
//! `[begin, end)`, backed by an AVL tree keyed on `begin` whose nodes live
//! in a caller-supplied [`NodePool`]. Two independent instances track all
//! memory the firmware ever reported (`known`) and the part of it that is
//! currently unallocated (`free`).
//!
//! ### Invariants
//! - No two stored ranges overlap **or touch**: the mutators always merge
//!   an inserted range with any neighbor sharing an endpoint, so in-order
//!   traversal yields strictly increasing, non-adjacent ranges.
//! - Every node belongs to exactly one set; erased nodes go straight back
//!   to the pool.
//!
//! The pool is passed into every operation rather than owned here because
//! one pool feeds both sets; see [`BootAllocator`](crate::balloc::BootAllocator).

use crate::node_pool::{NIL, NodePool};
use kernel_bootinfo::PhysRange;

/// Ordered set of disjoint, non-adjacent `[begin, end)` ranges.
pub struct RangeSet {
    root: usize,
    len: usize,
}

impl RangeSet {
    /// An empty set. Holds no pool resources until the first insert.
    #[must_use]
    pub const fn new() -> Self {
        Self { root: NIL, len: 0 }
    }

    /// Number of stored (maximal) ranges.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `[from, to)`, coalescing with any touching or overlapping
    /// stored neighbor.
    ///
    /// At most one predecessor and one successor are absorbed: stored
    /// ranges are already maximal, so a merge cannot chain further.
    ///
    /// # Panics
    /// If `from >= to`, or if the pool is exhausted (fatal, see
    /// [`NodePool`]).
    pub fn add_range<const N: usize>(&mut self, pool: &mut NodePool<N>, from: u64, to: u64) {
        assert!(from < to, "add_range requires a non-empty range");
        let mut begin = from;
        let mut end = to;

        // Absorb the neighbor below: the greatest stored `begin` strictly
        // under `from`. Touching counts, overlap counts.
        let pred = self.predecessor_before(pool, from);
        if pred != NIL && pool.node(pred).end >= from {
            let absorbed = *pool.node(pred);
            self.unlink(pool, pred);
            pool.release(pred);
            begin = absorbed.begin;
            if absorbed.end > end {
                end = absorbed.end;
            }
        }

        // Absorb the neighbor above. Looking for `begin >= from` (not
        // strictly greater) also swallows a re-reported duplicate of an
        // existing range, which malformed firmware maps do produce.
        let succ = self.first_at_or_after(pool, from);
        if succ != NIL && pool.node(succ).begin <= end {
            let absorbed_end = pool.node(succ).end;
            self.unlink(pool, succ);
            pool.release(succ);
            if absorbed_end > end {
                end = absorbed_end;
            }
        }

        let id = pool.acquire(begin, end);
        self.root = insert_at(pool, self.root, id);
        self.len += 1;
    }

    /// Remove every byte of `[from, to)` from the set.
    ///
    /// Stored ranges straddling an endpoint are trimmed; a range covering
    /// the whole interval is split in two. Surviving fragments re-enter
    /// through [`add_range`](Self::add_range): they were carved out of a
    /// single disjoint range, so no further merging can occur, and the
    /// invariant-restoring logic stays in one place.
    ///
    /// `from == to` is a permitted no-op.
    ///
    /// # Panics
    /// If `from > to`, or if the pool is exhausted.
    pub fn remove_range<const N: usize>(&mut self, pool: &mut NodePool<N>, from: u64, to: u64) {
        assert!(from <= to, "remove_range requires an ordered range");
        if from == to {
            return;
        }
        loop {
            let id = self.first_ending_after(pool, from);
            if id == NIL {
                break;
            }
            let node = *pool.node(id);
            if node.begin >= to {
                break;
            }
            self.unlink(pool, id);
            pool.release(id);
            if node.begin < from {
                self.add_range(pool, node.begin, from);
            }
            if node.end > to {
                self.add_range(pool, to, node.end);
            }
        }
    }

    /// Lowest stored range.
    #[must_use]
    pub fn first<const N: usize>(&self, pool: &NodePool<N>) -> Option<PhysRange> {
        let id = self.leftmost(pool);
        if id == NIL {
            return None;
        }
        let node = pool.node(id);
        Some(PhysRange::new(node.begin, node.end))
    }

    /// Highest stored range.
    #[must_use]
    pub fn last<const N: usize>(&self, pool: &NodePool<N>) -> Option<PhysRange> {
        let mut id = self.root;
        if id == NIL {
            return None;
        }
        while pool.node(id).right != NIL {
            id = pool.node(id).right;
        }
        let node = pool.node(id);
        Some(PhysRange::new(node.begin, node.end))
    }

    /// Iterate the stored ranges in ascending address order.
    #[must_use]
    pub fn ranges<'a, const N: usize>(&'a self, pool: &'a NodePool<N>) -> Ranges<'a, N> {
        Ranges {
            set: self,
            pool,
            cursor: self.leftmost(pool),
        }
    }

    /// The first stored range that could overlap an interval starting at
    /// `from`: the deepest node with `end > from` on a leftward descent.
    pub(crate) fn first_ending_after<const N: usize>(
        &self,
        pool: &NodePool<N>,
        from: u64,
    ) -> usize {
        let mut cursor = self.root;
        let mut candidate = NIL;
        while cursor != NIL {
            if pool.node(cursor).end > from {
                candidate = cursor;
                cursor = pool.node(cursor).left;
            } else {
                cursor = pool.node(cursor).right;
            }
        }
        candidate
    }

    /// Smallest stored `begin` strictly greater than `key`.
    pub(crate) fn successor_after<const N: usize>(&self, pool: &NodePool<N>, key: u64) -> usize {
        let mut cursor = self.root;
        let mut candidate = NIL;
        while cursor != NIL {
            if pool.node(cursor).begin > key {
                candidate = cursor;
                cursor = pool.node(cursor).left;
            } else {
                cursor = pool.node(cursor).right;
            }
        }
        candidate
    }

    /// Remove `id` from the tree and hand its slot back to the pool.
    pub(crate) fn detach<const N: usize>(&mut self, pool: &mut NodePool<N>, id: usize) {
        self.unlink(pool, id);
        pool.release(id);
    }

    /// Greatest stored `begin` strictly less than `key`.
    fn predecessor_before<const N: usize>(&self, pool: &NodePool<N>, key: u64) -> usize {
        let mut cursor = self.root;
        let mut candidate = NIL;
        while cursor != NIL {
            if pool.node(cursor).begin < key {
                candidate = cursor;
                cursor = pool.node(cursor).right;
            } else {
                cursor = pool.node(cursor).left;
            }
        }
        candidate
    }

    /// Smallest stored `begin` greater than or equal to `key`.
    fn first_at_or_after<const N: usize>(&self, pool: &NodePool<N>, key: u64) -> usize {
        let mut cursor = self.root;
        let mut candidate = NIL;
        while cursor != NIL {
            if pool.node(cursor).begin >= key {
                candidate = cursor;
                cursor = pool.node(cursor).left;
            } else {
                cursor = pool.node(cursor).right;
            }
        }
        candidate
    }

    fn leftmost<const N: usize>(&self, pool: &NodePool<N>) -> usize {
        let mut id = self.root;
        if id == NIL {
            return NIL;
        }
        while pool.node(id).left != NIL {
            id = pool.node(id).left;
        }
        id
    }

    /// Remove `id` from the tree without releasing its slot.
    fn unlink<const N: usize>(&mut self, pool: &mut NodePool<N>, id: usize) {
        let key = pool.node(id).begin;
        let (root, removed) = remove_at(pool, self.root, key);
        debug_assert_eq!(removed, id, "unlinked a different node than requested");
        self.root = root;
        self.len -= 1;
    }
}

impl Default for RangeSet {
    fn default() -> Self {
        Self::new()
    }
}

/// In-order iterator over a [`RangeSet`].
///
/// Advances by successor search from the root, so each step is `O(log n)`
/// and no per-iterator stack is needed — there is no heap to put one on.
pub struct Ranges<'a, const N: usize> {
    set: &'a RangeSet,
    pool: &'a NodePool<N>,
    cursor: usize,
}

impl<const N: usize> Iterator for Ranges<'_, N> {
    type Item = PhysRange;

    fn next(&mut self) -> Option<PhysRange> {
        if self.cursor == NIL {
            return None;
        }
        let node = self.pool.node(self.cursor);
        let item = PhysRange::new(node.begin, node.end);
        self.cursor = self.set.successor_after(self.pool, node.begin);
        Some(item)
    }
}

fn height<const N: usize>(pool: &NodePool<N>, id: usize) -> i8 {
    if id == NIL { 0 } else { pool.node(id).height }
}

fn update_height<const N: usize>(pool: &mut NodePool<N>, id: usize) {
    let left = height(pool, pool.node(id).left);
    let right = height(pool, pool.node(id).right);
    pool.node_mut(id).height = 1 + left.max(right);
}

fn balance_of<const N: usize>(pool: &NodePool<N>, id: usize) -> i8 {
    height(pool, pool.node(id).left) - height(pool, pool.node(id).right)
}

fn rotate_left<const N: usize>(pool: &mut NodePool<N>, id: usize) -> usize {
    let pivot = pool.node(id).right;
    let moved = pool.node(pivot).left;
    pool.node_mut(id).right = moved;
    pool.node_mut(pivot).left = id;
    update_height(pool, id);
    update_height(pool, pivot);
    pivot
}

fn rotate_right<const N: usize>(pool: &mut NodePool<N>, id: usize) -> usize {
    let pivot = pool.node(id).left;
    let moved = pool.node(pivot).right;
    pool.node_mut(id).left = moved;
    pool.node_mut(pivot).right = id;
    update_height(pool, id);
    update_height(pool, pivot);
    pivot
}

fn rebalance<const N: usize>(pool: &mut NodePool<N>, id: usize) -> usize {
    update_height(pool, id);
    let balance = balance_of(pool, id);
    if balance > 1 {
        if balance_of(pool, pool.node(id).left) < 0 {
            let left = rotate_left(pool, pool.node(id).left);
            pool.node_mut(id).left = left;
        }
        return rotate_right(pool, id);
    }
    if balance < -1 {
        if balance_of(pool, pool.node(id).right) > 0 {
            let right = rotate_right(pool, pool.node(id).right);
            pool.node_mut(id).right = right;
        }
        return rotate_left(pool, id);
    }
    id
}

/// Insert `id` keyed on its `begin`; returns the new subtree root.
///
/// Equal keys descend left. The tie-break is deterministic but should be
/// unreachable: disjoint non-adjacent ranges never share a `begin`, and
/// [`RangeSet::add_range`] absorbs a duplicate before linking.
fn insert_at<const N: usize>(pool: &mut NodePool<N>, id: usize, new: usize) -> usize {
    if id == NIL {
        return new;
    }
    if pool.node(id).begin < pool.node(new).begin {
        let right = insert_at(pool, pool.node(id).right, new);
        pool.node_mut(id).right = right;
    } else {
        let left = insert_at(pool, pool.node(id).left, new);
        pool.node_mut(id).left = left;
    }
    rebalance(pool, id)
}

/// Remove the node keyed `key`; returns `(new subtree root, removed id)`.
///
/// The removed node keeps its identity: an in-tree successor is relinked
/// in its place rather than having its payload copied, so node ids held by
/// callers stay valid across unrelated removals.
fn remove_at<const N: usize>(pool: &mut NodePool<N>, id: usize, key: u64) -> (usize, usize) {
    if id == NIL {
        return (NIL, NIL);
    }
    let begin = pool.node(id).begin;
    if key < begin {
        let (left, removed) = remove_at(pool, pool.node(id).left, key);
        pool.node_mut(id).left = left;
        if removed == NIL {
            return (id, NIL);
        }
        return (rebalance(pool, id), removed);
    }
    if key > begin {
        let (right, removed) = remove_at(pool, pool.node(id).right, key);
        pool.node_mut(id).right = right;
        if removed == NIL {
            return (id, NIL);
        }
        return (rebalance(pool, id), removed);
    }
    let left = pool.node(id).left;
    let right = pool.node(id).right;
    if left == NIL {
        return (right, id);
    }
    if right == NIL {
        return (left, id);
    }
    let (right, successor) = detach_min(pool, right);
    pool.node_mut(successor).left = left;
    pool.node_mut(successor).right = right;
    (rebalance(pool, successor), id)
}

/// Detach the minimum of the subtree; returns `(new subtree root, min id)`.
fn detach_min<const N: usize>(pool: &mut NodePool<N>, id: usize) -> (usize, usize) {
    if pool.node(id).left == NIL {
        return (pool.node(id).right, id);
    }
    let (left, min) = detach_min(pool, pool.node(id).left);
    pool.node_mut(id).left = left;
    (rebalance(pool, id), min)
}
