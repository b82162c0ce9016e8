//! Price level - a FIFO queue of orders at a single price point.
//!
//! Implemented as an intrusive doubly-linked list over arena indices:
//! O(1) append at the tail, O(1) unlink from any position. The matcher
//! is the only writer; snapshot readers walk `head`/`next` concurrently
//! and filter on order status, so unlinking must publish the Inactive
//! status before any pointer fix-up (see [`unlink_already_inactive`]).
//!
//! [`unlink_already_inactive`]: PriceLevel::unlink_already_inactive

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crate::arena::{OrderArena, OrderSlot, SlotIndex, NIL};
use crate::types::OrderStatus;

/// A queue of orders at a specific price level (price-time priority).
#[derive(Debug)]
pub struct PriceLevel {
    /// Index of the oldest order (highest priority, first to match)
    head: AtomicU32,
    /// Index of the newest order (last to match)
    tail: AtomicU32,
    /// Sum of remaining quantities of linked orders
    total_qty: AtomicI64,
}

impl PriceLevel {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicU32::new(NIL),
            tail: AtomicU32::new(NIL),
            total_qty: AtomicI64::new(0),
        }
    }

    /// Reset for reuse when the owning tree node is recycled.
    pub(crate) fn reset(&self) {
        self.head.store(NIL, Ordering::Release);
        self.tail.store(NIL, Ordering::Release);
        self.total_qty.store(0, Ordering::Release);
    }

    #[inline]
    pub(crate) fn head(&self) -> SlotIndex {
        self.head.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn tail(&self) -> SlotIndex {
        self.tail.load(Ordering::Acquire)
    }

    /// Total remaining quantity across linked orders.
    #[inline]
    pub fn total_qty(&self) -> i64 {
        self.total_qty.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head() == NIL
    }

    /// Append an order at the tail (newest position).
    ///
    /// The order's links must already be cleared; its quantity is added
    /// to the level aggregate.
    pub(crate) fn enqueue(&self, arena: &OrderArena, idx: SlotIndex) {
        let slot = arena.slot(idx);
        slot.set_next(NIL);

        let tail = self.tail();
        if tail != NIL {
            slot.set_prev(tail);
            // Publishing the tail's next link makes the node visible to
            // readers already walking the FIFO.
            arena.slot(tail).set_next(idx);
        } else {
            slot.set_prev(NIL);
            self.head.store(idx, Ordering::Release);
        }
        self.tail.store(idx, Ordering::Release);
        self.total_qty.fetch_add(slot.qty(), Ordering::AcqRel);
    }

    /// Unlink an order the caller has already marked Inactive.
    ///
    /// The Inactive store must precede this call: a reader racing the
    /// pointer fix-ups either sees the node still linked (and skips it
    /// by status) or sees the repaired links. The aggregate is reduced
    /// by the order's remaining quantity at unlink time.
    pub(crate) fn unlink_already_inactive(&self, arena: &OrderArena, idx: SlotIndex) {
        let slot = arena.slot(idx);
        debug_assert_eq!(slot.status(), OrderStatus::Inactive);

        let prev = slot.prev();
        let next = slot.next();

        if prev != NIL {
            arena.slot(prev).set_next(next);
        } else {
            self.head.store(next, Ordering::Release);
        }
        if next != NIL {
            arena.slot(next).set_prev(prev);
        } else {
            self.tail.store(prev, Ordering::Release);
        }

        self.total_qty.fetch_sub(slot.qty(), Ordering::AcqRel);
        slot.set_next(NIL);
        slot.set_prev(NIL);
    }

    /// Reduce the aggregate after a partial fill of a linked order.
    #[inline]
    pub(crate) fn sub_qty(&self, qty: i64) {
        debug_assert!(self.total_qty() >= qty);
        self.total_qty.fetch_sub(qty, Ordering::AcqRel);
    }

    /// Walk the FIFO head to tail, visiting orders that read as Active.
    ///
    /// Safe to call from snapshot readers concurrently with the matcher.
    pub(crate) fn for_each_active<F>(&self, arena: &OrderArena, mut visit: F)
    where
        F: FnMut(&OrderSlot),
    {
        let mut n = self.head();
        while n != NIL {
            let slot = arena.slot(n);
            if slot.status() == OrderStatus::Active {
                visit(slot);
            }
            n = slot.next();
        }
    }
}
