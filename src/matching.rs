//! Matching core - placement pipeline, cross/rest algorithm, cancel
//! path, and the epoch-driven reclamation drain.
//!
//! The pipeline for a placement:
//! 1. Acquire a slot from the pool and record the sequence number.
//! 2. FOK: dry-run liquidity pre-check against the opposite index.
//! 3. PostOnly: reject outright if the order would cross.
//! 4. CROSSING: match head-first against the best opposite levels.
//! 5. RESTING or retirement, depending on order type and residual.
//!
//! Everything here runs on the single matcher thread. Retired slots
//! travel through the SPSC retire ring and come back to the pool once
//! no snapshot reader can still observe them.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::arena::{OrderHandle, SlotIndex, NIL};
use crate::book::{Reader, Shared};
use crate::epoch::{min_active_epoch, NO_ACTIVE_READER};
use crate::error::Error;
use crate::ring::RetireRing;
use crate::types::{OrderType, Side};

/// Book-side location of a resting order, kept for cancel-by-id.
#[derive(Clone, Copy, Debug)]
struct RestingInfo {
    slot: SlotIndex,
    side: Side,
    price: i64,
}

/// The single-writer matching core.
#[derive(Debug)]
pub(crate) struct Matcher {
    shared: Arc<Shared>,
    ring: RetireRing,
    /// Resting orders by caller-assigned id (most recent wins on reuse)
    resting: FxHashMap<u64, RestingInfo>,
}

impl Matcher {
    pub(crate) fn new(shared: Arc<Shared>, ring_capacity: u64) -> Self {
        let pool_capacity = shared.arena.capacity() as usize;
        Self {
            shared,
            ring: RetireRing::new(ring_capacity),
            resting: FxHashMap::with_capacity_and_hasher(pool_capacity, Default::default()),
        }
    }

    #[inline]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Number of orders currently resting in the book.
    #[inline]
    pub(crate) fn resting_count(&self) -> usize {
        self.resting.len()
    }

    /// Number of retired orders awaiting reclamation.
    #[inline]
    pub(crate) fn pending_retired(&self) -> u64 {
        self.ring.len()
    }

    /// Place an order: match against the opposite side, then rest or
    /// retire the residual per order type.
    ///
    /// Callers must not send zero or negative quantities. Type
    /// rejections (PostOnly cross, FOK shortfall) are not errors; the
    /// returned handle reads Inactive with `filled == 0`.
    pub(crate) fn place(
        &mut self,
        side: Side,
        otype: OrderType,
        mut price: i64,
        id: u64,
        qty: i64,
        seq: u64,
    ) -> Result<OrderHandle, Error> {
        debug_assert!(qty > 0, "zero-quantity placement is a caller bug");

        // Market orders don't use price
        if otype == OrderType::Market {
            price = 0;
        }

        let idx = self
            .shared
            .arena
            .acquire()
            .ok_or(Error::PoolExhausted(self.shared.arena.capacity()))?;
        self.shared
            .arena
            .slot(idx)
            .populate(id, side, otype, price, qty, seq);
        // Sequence is recorded at acceptance, before matching
        self.shared.book.last_seq.store(seq, Ordering::Release);

        // FOK dry-run: reject without any partial fill
        if otype == OrderType::Fok {
            let available = self.check_liquidity(side, price, qty);
            if available < qty {
                trace!(id, seq, available, qty, "FOK rejected: insufficient liquidity");
                self.retire_in_flight(idx)?;
                return Ok(OrderHandle(idx));
            }
        }

        // PostOnly never trades: reject before the matching loop runs
        if otype == OrderType::PostOnly && self.would_cross(side, price) {
            trace!(id, seq, price, "post-only rejected: would cross");
            self.retire_in_flight(idx)?;
            return Ok(OrderHandle(idx));
        }

        let filled = self.execute_match(idx, side, otype, price)?;
        self.shared.arena.slot(idx).set_filled(filled);

        let remaining = self.shared.arena.slot(idx).qty();
        let rests =
            remaining > 0 && matches!(otype, OrderType::Limit | OrderType::PostOnly);
        if rests {
            self.rest(idx, id, side, price);
        } else {
            // Fully matched, or a residual the type forbids resting
            self.retire_in_flight(idx)?;
        }
        trace!(id, seq, filled, remaining, rests, "order placed");
        Ok(OrderHandle(idx))
    }

    /// Cancel a known resting order.
    ///
    /// Precondition: the caller holds a non-aliased handle and the book
    /// has not already retired it; canceling an Inactive handle is
    /// undefined.
    pub(crate) fn cancel(
        &mut self,
        price: i64,
        handle: OrderHandle,
        side: Side,
    ) -> Result<(), Error> {
        trace!(price, ?side, "cancel order");
        self.retire_resting(price, handle.0, side)
    }

    /// Cancel by caller-assigned id. Returns the canceled handle, or
    /// `None` if no resting order carries this id.
    pub(crate) fn cancel_by_id(&mut self, id: u64) -> Result<Option<OrderHandle>, Error> {
        let Some(info) = self.resting.get(&id).copied() else {
            return Ok(None);
        };
        self.retire_resting(info.price, info.slot, info.side)?;
        Ok(Some(OrderHandle(info.slot)))
    }

    /// Advance the global epoch and drain the retire ring back into the
    /// pool, honoring registered reader epochs. Returns the number of
    /// slots released.
    pub(crate) fn advance_epoch_and_reclaim(&mut self, readers: &[&Reader]) -> usize {
        let epoch = self.shared.epoch.advance();
        let min = min_active_epoch(readers.iter().map(|r| r.slot()));

        let mut released = 0usize;
        while let Some(idx) = self.ring.dequeue() {
            let retired_at = self.shared.arena.slot(idx).retire_epoch();
            if min == NO_ACTIVE_READER || retired_at < min {
                self.shared.arena.release(idx);
                released += 1;
            } else {
                // Still observable by a live reader. Put it back at the
                // tail and stop; later ticks retry with a higher floor.
                let requeued = self.ring.enqueue(idx);
                debug_assert!(requeued, "slot was just dequeued; space must exist");
                break;
            }
        }
        debug!(epoch, released, pending = self.ring.len(), "epoch advanced");
        released
    }

    // ------------------------------------------------------------------
    // Matching loop
    // ------------------------------------------------------------------

    /// Match the taker head-first against the best opposite levels.
    /// Returns the total quantity traded.
    fn execute_match(
        &mut self,
        taker: SlotIndex,
        side: Side,
        otype: OrderType,
        limit: i64,
    ) -> Result<i64, Error> {
        let mut filled = 0i64;

        loop {
            let (best_price, head, trade, head_done) = {
                let taker_slot = self.shared.arena.slot(taker);
                let remaining = taker_slot.qty();
                if remaining <= 0 {
                    break;
                }

                let best = match side {
                    Side::Bid => self.shared.book.asks.min_level(),
                    Side::Ask => self.shared.book.bids.max_level(),
                };
                let Some((best_price, level)) = best else {
                    break;
                };

                // Market orders and market-priced FOKs take any price
                let marketable = match otype {
                    OrderType::Market => true,
                    OrderType::Fok if limit == 0 => true,
                    _ => match side {
                        Side::Bid => best_price <= limit,
                        Side::Ask => best_price >= limit,
                    },
                };
                if !marketable {
                    break;
                }

                // Empty levels are deleted eagerly, so the head exists
                let head = level.head();
                if head == NIL {
                    break;
                }
                let head_slot = self.shared.arena.slot(head);
                let head_qty = head_slot.qty();

                let trade = remaining.min(head_qty);
                taker_slot.set_qty(remaining - trade);
                head_slot.set_qty(head_qty - trade);
                head_slot.set_filled(head_slot.filled() + trade);
                level.sub_qty(trade);

                (best_price, head, trade, head_qty == trade)
            };

            filled += trade;
            trace!(price = best_price, qty = trade, "trade");

            if head_done {
                // A depleted maker leaves through the same path as a
                // cancel: Inactive, epoch-stamped, unlinked, retired.
                self.retire_resting(best_price, head, side.opposite())?;
            }
        }

        Ok(filled)
    }

    // ------------------------------------------------------------------
    // FOK pre-check & PostOnly cross test
    // ------------------------------------------------------------------

    /// Total opposite-side quantity marketable against `limit_price`,
    /// walked best-first with early stop once `desired` is covered.
    /// A zero limit is the market-priced variant: all depth counts.
    fn check_liquidity(&self, side: Side, limit_price: i64, desired: i64) -> i64 {
        let mut available = 0i64;
        let unbounded = limit_price == 0;
        match side {
            Side::Bid => self.shared.book.asks.for_each_ascending(|price, level| {
                if !unbounded && price > limit_price {
                    return false;
                }
                available += level.total_qty();
                available < desired
            }),
            Side::Ask => self.shared.book.bids.for_each_descending(|price, level| {
                if !unbounded && price < limit_price {
                    return false;
                }
                available += level.total_qty();
                available < desired
            }),
        }
        available
    }

    fn would_cross(&self, side: Side, price: i64) -> bool {
        match side {
            Side::Bid => self.shared.book.best_ask().is_some_and(|ask| ask <= price),
            Side::Ask => self.shared.book.best_bid().is_some_and(|bid| bid >= price),
        }
    }

    // ------------------------------------------------------------------
    // Retirement & resting
    // ------------------------------------------------------------------

    /// Rest the residual at its own-side level, tail of the FIFO.
    fn rest(&mut self, idx: SlotIndex, id: u64, side: Side, price: i64) {
        let level = self.shared.book.tree(side).upsert(price);
        level.enqueue(&self.shared.arena, idx);
        self.resting.insert(
            id,
            RestingInfo {
                slot: idx,
                side,
                price,
            },
        );
    }

    /// Retire an order that never rested: Inactive, epoch-stamped,
    /// straight into the retire ring.
    fn retire_in_flight(&self, idx: SlotIndex) -> Result<(), Error> {
        let slot = self.shared.arena.slot(idx);
        slot.set_inactive();
        slot.set_retire_epoch(self.shared.epoch.current());
        if !self.ring.enqueue(idx) {
            return Err(Error::RetireRingFull(self.ring.capacity()));
        }
        Ok(())
    }

    /// Retire a linked order: Inactive first (readers racing the unlink
    /// skip it by status), stamp the epoch, unlink, drop the level if
    /// it emptied, and enqueue to the retire ring.
    fn retire_resting(&mut self, price: i64, idx: SlotIndex, side: Side) -> Result<(), Error> {
        let slot = self.shared.arena.slot(idx);
        slot.set_inactive();
        slot.set_retire_epoch(self.shared.epoch.current());
        let id = slot.id();

        let tree = self.shared.book.tree(side);
        if let Some(level) = tree.find(price) {
            level.unlink_already_inactive(&self.shared.arena, idx);
            if level.is_empty() {
                tree.delete(price);
            }
        }
        self.resting.remove(&id);

        if !self.ring.enqueue(idx) {
            return Err(Error::RetireRingFull(self.ring.capacity()));
        }
        Ok(())
    }
}
