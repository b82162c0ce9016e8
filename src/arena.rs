//! Order arena - the fixed-capacity pool of preallocated order records.
//!
//! The arena allocates a contiguous block of order slots at startup and
//! never allocates again; acquire and release run in O(1) against a LIFO
//! free list threaded through the `next` field of pooled slots. Slots are
//! addressed by stable `u32` indices instead of pointers, which halves
//! link metadata and lets the retire ring and price levels store plain
//! integers.
//!
//! Every field a concurrent snapshot reader may load is an atomic. The
//! matcher is the sole writer; readers only ever load.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::types::{OrderStatus, OrderType, Side};

/// Sentinel value representing a null/invalid slot index
pub const NIL: u32 = u32::MAX;

/// Type alias for arena slot indices - our "compressed pointers"
pub type SlotIndex = u32;

/// Opaque handle to an order record returned by placement.
///
/// The handle stays valid until the record has been reclaimed to the
/// pool; callers inspect the underlying slot through
/// [`Engine::order`](crate::Engine::order).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderHandle(pub(crate) SlotIndex);

/// A single order record - exactly 64 bytes (one cache line).
///
/// # Memory Layout
///
/// | Field        | Type      | Size |
/// |--------------|-----------|------|
/// | id           | AtomicU64 | 8    |
/// | price        | AtomicI64 | 8    |
/// | qty          | AtomicI64 | 8    |
/// | filled       | AtomicI64 | 8    |
/// | seq          | AtomicU64 | 8    |
/// | retire_epoch | AtomicU64 | 8    |
/// | next         | AtomicU32 | 4    |
/// | prev         | AtomicU32 | 4    |
/// | side         | AtomicU8  | 1    |
/// | otype        | AtomicU8  | 1    |
/// | status       | AtomicU8  | 1    |
/// | (padding)    | -         | 5    |
///
/// While the slot sits in the pool's free list, `next` holds the free-list
/// successor instead of a FIFO link.
#[repr(C)]
#[repr(align(64))]
pub struct OrderSlot {
    id: AtomicU64,
    price: AtomicI64,
    /// Remaining quantity; only decreases while the order is Active
    qty: AtomicI64,
    /// Cumulative filled quantity; only increases
    filled: AtomicI64,
    seq: AtomicU64,
    /// Global epoch observed at the moment the order went Inactive
    retire_epoch: AtomicU64,
    /// FIFO successor within a price level (free-list link while pooled)
    next: AtomicU32,
    /// FIFO predecessor within a price level
    prev: AtomicU32,
    side: AtomicU8,
    otype: AtomicU8,
    status: AtomicU8,
}

// Compile-time assertion: OrderSlot must be exactly one cache line
const _: () = assert!(
    std::mem::size_of::<OrderSlot>() == 64,
    "OrderSlot must be exactly 64 bytes (one cache line)"
);

const _: () = assert!(
    std::mem::align_of::<OrderSlot>() == 64,
    "OrderSlot must be 64-byte aligned"
);

impl OrderSlot {
    fn empty() -> Self {
        Self {
            id: AtomicU64::new(0),
            price: AtomicI64::new(0),
            qty: AtomicI64::new(0),
            filled: AtomicI64::new(0),
            seq: AtomicU64::new(0),
            retire_epoch: AtomicU64::new(0),
            next: AtomicU32::new(NIL),
            prev: AtomicU32::new(NIL),
            side: AtomicU8::new(Side::Bid as u8),
            otype: AtomicU8::new(OrderType::Limit as u8),
            status: AtomicU8::new(OrderStatus::Inactive as u8),
        }
    }

    // ------------------------------------------------------------------
    // Reader-facing accessors (acquire loads)
    // ------------------------------------------------------------------

    /// Caller-assigned order identifier
    #[inline]
    pub fn id(&self) -> u64 {
        self.id.load(Ordering::Acquire)
    }

    /// Limit price (0 for Market orders)
    #[inline]
    pub fn price(&self) -> i64 {
        self.price.load(Ordering::Acquire)
    }

    /// Remaining quantity
    #[inline]
    pub fn qty(&self) -> i64 {
        self.qty.load(Ordering::Acquire)
    }

    /// Cumulative filled quantity
    #[inline]
    pub fn filled(&self) -> i64 {
        self.filled.load(Ordering::Acquire)
    }

    /// Monotonic sequence identifier recorded at acceptance
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    #[inline]
    pub fn side(&self) -> Side {
        Side::from_raw(self.side.load(Ordering::Acquire))
    }

    #[inline]
    pub fn order_type(&self) -> OrderType {
        OrderType::from_raw(self.otype.load(Ordering::Acquire))
    }

    #[inline]
    pub fn status(&self) -> OrderStatus {
        OrderStatus::from_raw(self.status.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn retire_epoch(&self) -> u64 {
        self.retire_epoch.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn next(&self) -> SlotIndex {
        self.next.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn prev(&self) -> SlotIndex {
        self.prev.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Writer-facing mutators (matcher/reclaimer only, release stores)
    // ------------------------------------------------------------------

    #[inline]
    pub(crate) fn set_qty(&self, qty: i64) {
        self.qty.store(qty, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_filled(&self, filled: i64) {
        self.filled.store(filled, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_next(&self, idx: SlotIndex) {
        self.next.store(idx, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_prev(&self, idx: SlotIndex) {
        self.prev.store(idx, Ordering::Release);
    }

    /// Publish the Inactive status.
    ///
    /// The release store orders the status write before any subsequent
    /// unlink pointer fix-ups, so a reader that still reaches this slot
    /// through stale links observes Inactive and skips it.
    #[inline]
    pub(crate) fn set_inactive(&self) {
        self.status.store(OrderStatus::Inactive as u8, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_retire_epoch(&self, epoch: u64) {
        self.retire_epoch.store(epoch, Ordering::Release);
    }

    /// Populate the slot for a fresh placement (matcher only).
    #[inline]
    pub(crate) fn populate(
        &self,
        id: u64,
        side: Side,
        otype: OrderType,
        price: i64,
        qty: i64,
        seq: u64,
    ) {
        self.id.store(id, Ordering::Release);
        self.side.store(side as u8, Ordering::Release);
        self.otype.store(otype as u8, Ordering::Release);
        self.price.store(price, Ordering::Release);
        self.qty.store(qty, Ordering::Release);
        self.seq.store(seq, Ordering::Release);
    }

    /// Reset to the pooled defaults: status Active, everything else zero.
    fn reset_for_acquire(&self) {
        self.id.store(0, Ordering::Release);
        self.price.store(0, Ordering::Release);
        self.qty.store(0, Ordering::Release);
        self.filled.store(0, Ordering::Release);
        self.seq.store(0, Ordering::Release);
        self.retire_epoch.store(0, Ordering::Release);
        self.next.store(NIL, Ordering::Release);
        self.prev.store(NIL, Ordering::Release);
        self.side.store(Side::Bid as u8, Ordering::Release);
        self.otype.store(OrderType::Limit as u8, Ordering::Release);
        self.status.store(OrderStatus::Active as u8, Ordering::Release);
    }
}

impl fmt::Debug for OrderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderSlot")
            .field("id", &self.id())
            .field("price", &self.price())
            .field("qty", &self.qty())
            .field("filled", &self.filled())
            .field("seq", &self.seq())
            .field("side", &self.side())
            .field("otype", &self.order_type())
            .field("status", &self.status())
            .finish()
    }
}

/// Pre-allocated pool of order slots with O(1) acquire and release.
///
/// The free list is threaded through the `next` field of unused slots;
/// the head index is only ever touched by the matcher/reclaimer thread.
/// No system calls or heap allocation after construction.
pub struct OrderArena {
    slots: Box<[OrderSlot]>,
    /// Head of the free list (matcher-owned; relaxed is sufficient)
    free_head: AtomicU32,
    /// Number of currently acquired slots
    in_use: AtomicU32,
}

impl OrderArena {
    /// Create a new arena with the specified capacity.
    ///
    /// # Panics
    /// Panics if capacity equals or exceeds `NIL` (reserved sentinel).
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NIL, "capacity must be less than NIL");

        let slots: Box<[OrderSlot]> = (0..capacity).map(|_| OrderSlot::empty()).collect();

        // Thread the free list through all slots, top at index 0
        for i in 0..capacity.saturating_sub(1) {
            slots[i as usize].next.store(i + 1, Ordering::Relaxed);
        }
        if capacity > 0 {
            slots[capacity as usize - 1].next.store(NIL, Ordering::Relaxed);
        }

        Self {
            slots,
            free_head: AtomicU32::new(if capacity > 0 { 0 } else { NIL }),
            in_use: AtomicU32::new(0),
        }
    }

    /// Acquire a slot from the pool, reset to placement defaults
    /// (status Active, all other fields zero).
    ///
    /// Returns `None` when the pool is exhausted.
    #[inline]
    pub(crate) fn acquire(&self) -> Option<SlotIndex> {
        let idx = self.free_head.load(Ordering::Relaxed);
        if idx == NIL {
            return None;
        }
        let slot = &self.slots[idx as usize];
        self.free_head
            .store(slot.next.load(Ordering::Relaxed), Ordering::Relaxed);
        self.in_use.fetch_add(1, Ordering::Relaxed);

        slot.reset_for_acquire();
        Some(idx)
    }

    /// Return a slot to the pool: linkage cleared, status Inactive.
    ///
    /// The caller must guarantee the epoch protocol has run its course:
    /// no snapshot reader can still reach this slot.
    #[inline]
    pub(crate) fn release(&self, idx: SlotIndex) {
        debug_assert!(idx < self.capacity(), "index out of bounds");
        debug_assert!(self.in_use.load(Ordering::Relaxed) > 0, "double release detected");

        let slot = &self.slots[idx as usize];
        slot.set_prev(NIL);
        slot.set_inactive();
        slot.next
            .store(self.free_head.load(Ordering::Relaxed), Ordering::Relaxed);
        self.free_head.store(idx, Ordering::Relaxed);
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }

    /// Borrow a slot by index.
    #[inline]
    pub fn slot(&self, idx: SlotIndex) -> &OrderSlot {
        &self.slots[idx as usize]
    }

    /// Number of currently acquired slots.
    #[inline]
    pub fn in_use(&self) -> u32 {
        self.in_use.load(Ordering::Relaxed)
    }

    /// Total slot capacity.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Pre-fault all slot pages (warm-up routine).
    ///
    /// Touches every slot to force the OS to map virtual pages to
    /// physical RAM before the hot path runs.
    pub(crate) fn warm_up(&self) {
        for slot in self.slots.iter() {
            slot.retire_epoch.store(0, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for OrderArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderArena")
            .field("capacity", &self.capacity())
            .field("in_use", &self.in_use())
            .finish()
    }
}
