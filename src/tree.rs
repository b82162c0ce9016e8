//! Ordered price index - a red-black tree of price levels.
//!
//! Nodes live in a fixed slab allocated at construction and are
//! addressed by `u32` indices; index 0 is the black sentinel leaf that
//! simplifies rotations and fix-ups. Child and parent links are atomics:
//! the matcher is the sole structural writer, while snapshot readers may
//! traverse concurrently after acquire-loading the root. Rotations keep
//! every (price, level) pair reachable from the root; readers tolerate
//! transient inconsistency because they filter orders by status, not by
//! tree-node identity.
//!
//! Point operations are O(log n); best-of-side is O(1) through cached
//! min/max node indices maintained by the writer and recomputed with a
//! spine walk when the cached extreme is deleted.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use crate::level::PriceLevel;

/// Node index within the slab; index 0 is the sentinel leaf.
pub(crate) type NodeIndex = u32;

const SENTINEL: NodeIndex = 0;

/// Free-list terminator (0 is taken by the sentinel).
const FREE_END: u32 = u32::MAX;

const RED: u8 = 0;
const BLACK: u8 = 1;

#[derive(Debug)]
struct TreeNode {
    key: AtomicI64,
    left: AtomicU32,
    /// Doubles as the free-list link while the node is unused
    right: AtomicU32,
    parent: AtomicU32,
    color: AtomicU8,
    level: PriceLevel,
}

impl TreeNode {
    fn sentinel() -> Self {
        Self {
            key: AtomicI64::new(0),
            left: AtomicU32::new(SENTINEL),
            right: AtomicU32::new(SENTINEL),
            parent: AtomicU32::new(SENTINEL),
            color: AtomicU8::new(BLACK),
            level: PriceLevel::new(),
        }
    }
}

/// Ordered mapping price -> [`PriceLevel`], single-writer.
#[derive(Debug)]
pub struct PriceTree {
    nodes: Box<[TreeNode]>,
    root: AtomicU32,
    free_head: AtomicU32,
    len: AtomicU32,
    /// Cached lowest-price node (SENTINEL when empty)
    min_cache: AtomicU32,
    /// Cached highest-price node (SENTINEL when empty)
    max_cache: AtomicU32,
}

impl PriceTree {
    /// Construct a tree able to hold `capacity` distinct price levels.
    pub(crate) fn new(capacity: u32) -> Self {
        assert!(capacity < FREE_END - 1, "capacity must be less than FREE_END");

        // Slot 0 is the sentinel; the slab proper starts at 1.
        let nodes: Box<[TreeNode]> = (0..capacity as usize + 1)
            .map(|_| TreeNode::sentinel())
            .collect();

        // Thread the free list through `right`
        for i in 1..capacity as usize {
            nodes[i].right.store(i as u32 + 1, Ordering::Relaxed);
        }
        if capacity > 0 {
            nodes[capacity as usize].right.store(FREE_END, Ordering::Relaxed);
        }

        Self {
            nodes,
            root: AtomicU32::new(SENTINEL),
            free_head: AtomicU32::new(if capacity > 0 { 1 } else { FREE_END }),
            len: AtomicU32::new(0),
            min_cache: AtomicU32::new(SENTINEL),
            max_cache: AtomicU32::new(SENTINEL),
        }
    }

    /// Number of price levels currently present.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Link accessors. Writer stores are release so readers traversing
    // concurrently see initialized nodes; loads are acquire.
    // ------------------------------------------------------------------

    #[inline]
    fn node(&self, i: NodeIndex) -> &TreeNode {
        &self.nodes[i as usize]
    }

    #[inline]
    fn key(&self, i: NodeIndex) -> i64 {
        self.node(i).key.load(Ordering::Acquire)
    }

    #[inline]
    fn left(&self, i: NodeIndex) -> NodeIndex {
        self.node(i).left.load(Ordering::Acquire)
    }

    #[inline]
    fn right(&self, i: NodeIndex) -> NodeIndex {
        self.node(i).right.load(Ordering::Acquire)
    }

    #[inline]
    fn parent(&self, i: NodeIndex) -> NodeIndex {
        self.node(i).parent.load(Ordering::Acquire)
    }

    #[inline]
    fn color(&self, i: NodeIndex) -> u8 {
        self.node(i).color.load(Ordering::Acquire)
    }

    #[inline]
    fn set_left(&self, i: NodeIndex, v: NodeIndex) {
        self.node(i).left.store(v, Ordering::Release);
    }

    #[inline]
    fn set_right(&self, i: NodeIndex, v: NodeIndex) {
        self.node(i).right.store(v, Ordering::Release);
    }

    #[inline]
    fn set_parent(&self, i: NodeIndex, v: NodeIndex) {
        self.node(i).parent.store(v, Ordering::Release);
    }

    #[inline]
    fn set_color(&self, i: NodeIndex, v: u8) {
        self.node(i).color.store(v, Ordering::Release);
    }

    #[inline]
    fn root_idx(&self) -> NodeIndex {
        self.root.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Slab free list (matcher only)
    // ------------------------------------------------------------------

    fn alloc_node(&self, price: i64) -> Option<NodeIndex> {
        let idx = self.free_head.load(Ordering::Relaxed);
        if idx == FREE_END {
            return None;
        }
        let node = self.node(idx);
        self.free_head
            .store(node.right.load(Ordering::Relaxed), Ordering::Relaxed);

        // Initialize before the node is linked anywhere
        node.key.store(price, Ordering::Release);
        node.color.store(RED, Ordering::Release);
        node.left.store(SENTINEL, Ordering::Release);
        node.right.store(SENTINEL, Ordering::Release);
        node.parent.store(SENTINEL, Ordering::Release);
        node.level.reset();
        Some(idx)
    }

    fn free_node(&self, idx: NodeIndex) {
        self.node(idx)
            .right
            .store(self.free_head.load(Ordering::Relaxed), Ordering::Relaxed);
        self.free_head.store(idx, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Point operations
    // ------------------------------------------------------------------

    fn find_node(&self, price: i64) -> NodeIndex {
        let mut n = self.root_idx();
        while n != SENTINEL {
            let k = self.key(n);
            if price < k {
                n = self.left(n);
            } else if price > k {
                n = self.right(n);
            } else {
                return n;
            }
        }
        SENTINEL
    }

    /// Find the level for `price`, if present.
    pub(crate) fn find(&self, price: i64) -> Option<&PriceLevel> {
        let n = self.find_node(price);
        if n == SENTINEL {
            None
        } else {
            Some(&self.node(n).level)
        }
    }

    /// Find the level for `price` or create it if missing.
    pub(crate) fn upsert(&self, price: i64) -> &PriceLevel {
        // Standard BST insert search
        let mut y = SENTINEL;
        let mut x = self.root_idx();
        while x != SENTINEL {
            y = x;
            let k = self.key(x);
            if price < k {
                x = self.left(x);
            } else if price > k {
                x = self.right(x);
            } else {
                return &self.node(x).level; // already present
            }
        }

        // The slab is sized to the order capacity: one level per
        // resting order is the worst case, so allocation cannot fail.
        let Some(z) = self.alloc_node(price) else {
            unreachable!("price tree slab exhausted");
        };
        self.set_parent(z, y);

        if y == SENTINEL {
            self.root.store(z, Ordering::Release);
        } else if price < self.key(y) {
            self.set_left(y, z);
        } else {
            self.set_right(y, z);
        }
        self.insert_fixup(z);
        self.len.fetch_add(1, Ordering::Relaxed);

        let mn = self.min_cache.load(Ordering::Relaxed);
        if mn == SENTINEL || price < self.key(mn) {
            self.min_cache.store(z, Ordering::Relaxed);
        }
        let mx = self.max_cache.load(Ordering::Relaxed);
        if mx == SENTINEL || price > self.key(mx) {
            self.max_cache.store(z, Ordering::Relaxed);
        }

        &self.node(z).level
    }

    /// Remove the level at `price`. Returns true if a node was removed.
    ///
    /// Caller contract: only delete empty levels.
    pub(crate) fn delete(&self, price: i64) -> bool {
        let z = self.find_node(price);
        if z == SENTINEL {
            return false;
        }
        let recompute_min = self.min_cache.load(Ordering::Relaxed) == z;
        let recompute_max = self.max_cache.load(Ordering::Relaxed) == z;

        self.delete_node(z);
        self.free_node(z);
        self.len.fetch_sub(1, Ordering::Relaxed);

        if recompute_min {
            self.min_cache
                .store(self.min_node(self.root_idx()), Ordering::Relaxed);
        }
        if recompute_max {
            self.max_cache
                .store(self.max_node(self.root_idx()), Ordering::Relaxed);
        }
        true
    }

    /// Lowest-price level (best ask side), or `None` if empty.
    #[inline]
    pub(crate) fn min_level(&self) -> Option<(i64, &PriceLevel)> {
        let n = self.min_cache.load(Ordering::Relaxed);
        if n == SENTINEL {
            None
        } else {
            Some((self.key(n), &self.node(n).level))
        }
    }

    /// Highest-price level (best bid side), or `None` if empty.
    #[inline]
    pub(crate) fn max_level(&self) -> Option<(i64, &PriceLevel)> {
        let n = self.max_cache.load(Ordering::Relaxed);
        if n == SENTINEL {
            None
        } else {
            Some((self.key(n), &self.node(n).level))
        }
    }

    /// Next higher price level after `price` (exclusive).
    pub(crate) fn successor(&self, price: i64) -> Option<(i64, &PriceLevel)> {
        let mut n = self.root_idx();
        let mut succ = SENTINEL;
        while n != SENTINEL {
            if price < self.key(n) {
                succ = n;
                n = self.left(n);
            } else {
                n = self.right(n);
            }
        }
        if succ == SENTINEL {
            None
        } else {
            Some((self.key(succ), &self.node(succ).level))
        }
    }

    /// Next lower price level before `price` (exclusive).
    pub(crate) fn predecessor(&self, price: i64) -> Option<(i64, &PriceLevel)> {
        let mut n = self.root_idx();
        let mut pred = SENTINEL;
        while n != SENTINEL {
            if price > self.key(n) {
                pred = n;
                n = self.right(n);
            } else {
                n = self.left(n);
            }
        }
        if pred == SENTINEL {
            None
        } else {
            Some((self.key(pred), &self.node(pred).level))
        }
    }

    /// Apply `visit` from lowest to highest price; stop when it
    /// returns false. Safe for concurrent snapshot readers.
    pub(crate) fn for_each_ascending<F>(&self, mut visit: F)
    where
        F: FnMut(i64, &PriceLevel) -> bool,
    {
        let mut n = self.min_node(self.root_idx());
        while n != SENTINEL {
            if !visit(self.key(n), &self.node(n).level) {
                return;
            }
            n = self.next(n);
        }
    }

    /// Apply `visit` from highest to lowest price; stop when it
    /// returns false. Safe for concurrent snapshot readers.
    pub(crate) fn for_each_descending<F>(&self, mut visit: F)
    where
        F: FnMut(i64, &PriceLevel) -> bool,
    {
        let mut n = self.max_node(self.root_idx());
        while n != SENTINEL {
            if !visit(self.key(n), &self.node(n).level) {
                return;
            }
            n = self.prev(n);
        }
    }

    // ------------------------------------------------------------------
    // Spine walks and in-order steps
    // ------------------------------------------------------------------

    fn min_node(&self, mut n: NodeIndex) -> NodeIndex {
        if n == SENTINEL {
            return SENTINEL;
        }
        loop {
            let l = self.left(n);
            if l == SENTINEL {
                return n;
            }
            n = l;
        }
    }

    fn max_node(&self, mut n: NodeIndex) -> NodeIndex {
        if n == SENTINEL {
            return SENTINEL;
        }
        loop {
            let r = self.right(n);
            if r == SENTINEL {
                return n;
            }
            n = r;
        }
    }

    /// In-order successor
    fn next(&self, mut n: NodeIndex) -> NodeIndex {
        let r = self.right(n);
        if r != SENTINEL {
            return self.min_node(r);
        }
        let mut p = self.parent(n);
        while p != SENTINEL && n == self.right(p) {
            n = p;
            p = self.parent(p);
        }
        p
    }

    /// In-order predecessor
    fn prev(&self, mut n: NodeIndex) -> NodeIndex {
        let l = self.left(n);
        if l != SENTINEL {
            return self.max_node(l);
        }
        let mut p = self.parent(n);
        while p != SENTINEL && n == self.left(p) {
            n = p;
            p = self.parent(p);
        }
        p
    }

    // ------------------------------------------------------------------
    // Rotations & fix-ups
    // ------------------------------------------------------------------

    fn left_rotate(&self, x: NodeIndex) {
        let y = self.right(x);
        let yl = self.left(y);
        self.set_right(x, yl);
        if yl != SENTINEL {
            self.set_parent(yl, x);
        }
        let xp = self.parent(x);
        self.set_parent(y, xp);
        if xp == SENTINEL {
            self.root.store(y, Ordering::Release);
        } else if x == self.left(xp) {
            self.set_left(xp, y);
        } else {
            self.set_right(xp, y);
        }
        self.set_left(y, x);
        self.set_parent(x, y);
    }

    fn right_rotate(&self, y: NodeIndex) {
        let x = self.left(y);
        let xr = self.right(x);
        self.set_left(y, xr);
        if xr != SENTINEL {
            self.set_parent(xr, y);
        }
        let yp = self.parent(y);
        self.set_parent(x, yp);
        if yp == SENTINEL {
            self.root.store(x, Ordering::Release);
        } else if y == self.right(yp) {
            self.set_right(yp, x);
        } else {
            self.set_left(yp, x);
        }
        self.set_right(x, y);
        self.set_parent(y, x);
    }

    fn insert_fixup(&self, mut z: NodeIndex) {
        while self.color(self.parent(z)) == RED {
            let zp = self.parent(z);
            let zpp = self.parent(zp);
            if zp == self.left(zpp) {
                let y = self.right(zpp); // uncle
                if self.color(y) == RED {
                    // Case 1: recolor and move up
                    self.set_color(zp, BLACK);
                    self.set_color(y, BLACK);
                    self.set_color(zpp, RED);
                    z = zpp;
                } else {
                    if z == self.right(zp) {
                        // Case 2
                        z = zp;
                        self.left_rotate(z);
                    }
                    // Case 3
                    let zp = self.parent(z);
                    let zpp = self.parent(zp);
                    self.set_color(zp, BLACK);
                    self.set_color(zpp, RED);
                    self.right_rotate(zpp);
                }
            } else {
                // mirror cases
                let y = self.left(zpp); // uncle
                if self.color(y) == RED {
                    self.set_color(zp, BLACK);
                    self.set_color(y, BLACK);
                    self.set_color(zpp, RED);
                    z = zpp;
                } else {
                    if z == self.left(zp) {
                        z = zp;
                        self.right_rotate(z);
                    }
                    let zp = self.parent(z);
                    let zpp = self.parent(zp);
                    self.set_color(zp, BLACK);
                    self.set_color(zpp, RED);
                    self.left_rotate(zpp);
                }
            }
        }
        self.set_color(self.root_idx(), BLACK);
    }

    fn transplant(&self, u: NodeIndex, v: NodeIndex) {
        let up = self.parent(u);
        if up == SENTINEL {
            self.root.store(v, Ordering::Release);
        } else if u == self.left(up) {
            self.set_left(up, v);
        } else {
            self.set_right(up, v);
        }
        // Writing the sentinel's parent is intentional: delete_fixup
        // may start from the sentinel and climbs through it.
        self.set_parent(v, up);
    }

    fn delete_node(&self, z: NodeIndex) {
        let mut y = z;
        let mut y_orig_color = self.color(y);
        let x;

        if self.left(z) == SENTINEL {
            x = self.right(z);
            self.transplant(z, x);
        } else if self.right(z) == SENTINEL {
            x = self.left(z);
            self.transplant(z, x);
        } else {
            y = self.min_node(self.right(z)); // in-order successor
            y_orig_color = self.color(y);
            x = self.right(y);
            if self.parent(y) == z {
                self.set_parent(x, y);
            } else {
                self.transplant(y, self.right(y));
                self.set_right(y, self.right(z));
                self.set_parent(self.right(y), y);
            }
            self.transplant(z, y);
            self.set_left(y, self.left(z));
            self.set_parent(self.left(y), y);
            self.set_color(y, self.color(z));
        }

        if y_orig_color == BLACK {
            self.delete_fixup(x);
        }
    }

    fn delete_fixup(&self, mut x: NodeIndex) {
        while x != self.root_idx() && self.color(x) == BLACK {
            let xp = self.parent(x);
            if x == self.left(xp) {
                let mut w = self.right(xp);
                if self.color(w) == RED {
                    // Case 1
                    self.set_color(w, BLACK);
                    self.set_color(xp, RED);
                    self.left_rotate(xp);
                    w = self.right(self.parent(x));
                }
                if self.color(self.left(w)) == BLACK && self.color(self.right(w)) == BLACK {
                    // Case 2
                    self.set_color(w, RED);
                    x = self.parent(x);
                } else {
                    if self.color(self.right(w)) == BLACK {
                        // Case 3
                        self.set_color(self.left(w), BLACK);
                        self.set_color(w, RED);
                        self.right_rotate(w);
                        w = self.right(self.parent(x));
                    }
                    // Case 4
                    let xp = self.parent(x);
                    self.set_color(w, self.color(xp));
                    self.set_color(xp, BLACK);
                    self.set_color(self.right(w), BLACK);
                    self.left_rotate(xp);
                    x = self.root_idx();
                }
            } else {
                // mirror cases
                let mut w = self.left(xp);
                if self.color(w) == RED {
                    self.set_color(w, BLACK);
                    self.set_color(xp, RED);
                    self.right_rotate(xp);
                    w = self.left(self.parent(x));
                }
                if self.color(self.right(w)) == BLACK && self.color(self.left(w)) == BLACK {
                    self.set_color(w, RED);
                    x = self.parent(x);
                } else {
                    if self.color(self.left(w)) == BLACK {
                        self.set_color(self.right(w), BLACK);
                        self.set_color(w, RED);
                        self.left_rotate(w);
                        w = self.left(self.parent(x));
                    }
                    let xp = self.parent(x);
                    self.set_color(w, self.color(xp));
                    self.set_color(xp, BLACK);
                    self.set_color(self.left(w), BLACK);
                    self.right_rotate(xp);
                    x = self.root_idx();
                }
            }
        }
        self.set_color(x, BLACK);
    }
}
