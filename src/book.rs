//! Order book - two ordered price indexes plus the snapshot reader.
//!
//! The book itself is a thin structure: bids and asks trees and the
//! last-accepted sequence number. All matching logic lives in
//! [`crate::matching`]; this module owns the shared state readers hang
//! on to and the weakly-consistent snapshot iteration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::arena::{OrderArena, OrderSlot};
use crate::epoch::{EpochClock, ReaderSlot};
use crate::tree::PriceTree;
use crate::types::Side;

/// Two-sided book: price-indexed bid and ask levels.
#[derive(Debug)]
pub struct OrderBook {
    pub(crate) bids: PriceTree,
    pub(crate) asks: PriceTree,
    /// Sequence of the most recently accepted placement
    pub(crate) last_seq: AtomicU64,
}

impl OrderBook {
    pub(crate) fn new(level_capacity: u32) -> Self {
        Self {
            bids: PriceTree::new(level_capacity),
            asks: PriceTree::new(level_capacity),
            last_seq: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn tree(&self, side: Side) -> &PriceTree {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Best bid price (highest buy price)
    #[inline]
    pub fn best_bid(&self) -> Option<i64> {
        self.bids.max_level().map(|(price, _)| price)
    }

    /// Best ask price (lowest sell price)
    #[inline]
    pub fn best_ask(&self) -> Option<i64> {
        self.asks.min_level().map(|(price, _)| price)
    }

    /// Spread (best ask - best bid), when both sides are present
    pub fn spread(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    /// Total resting quantity at a price level (0 if absent)
    pub fn depth_at(&self, side: Side, price: i64) -> i64 {
        self.tree(side)
            .find(price)
            .map(|level| level.total_qty())
            .unwrap_or(0)
    }

    /// Sequence number of the most recently accepted placement
    #[inline]
    pub fn last_seq(&self) -> u64 {
        self.last_seq.load(Ordering::Acquire)
    }
}

/// State shared between the matcher handle and snapshot readers.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) arena: OrderArena,
    pub(crate) book: OrderBook,
    pub(crate) epoch: EpochClock,
}

impl Shared {
    pub(crate) fn new(pool_capacity: u32) -> Self {
        Self {
            arena: OrderArena::new(pool_capacity),
            book: OrderBook::new(pool_capacity),
            epoch: EpochClock::new(),
        }
    }
}

/// A registered snapshot reader.
///
/// Each reader owns exactly one epoch registration slot; create one per
/// reading thread via [`Engine::reader`](crate::Engine::reader). The
/// matcher's reclaimer honors the slot: no order visited during a
/// snapshot is recycled before the reader exits its read section.
pub struct Reader {
    shared: Arc<Shared>,
    slot: ReaderSlot,
}

impl Reader {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            slot: ReaderSlot::new(),
        }
    }

    #[inline]
    pub(crate) fn slot(&self) -> &ReaderSlot {
        &self.slot
    }

    /// Enter a read section: publish the current global epoch.
    ///
    /// Prefer [`snapshot_active`](Self::snapshot_active), which brackets
    /// the walk automatically.
    #[inline]
    pub fn enter_read(&self) {
        self.slot.enter(&self.shared.epoch);
    }

    /// Leave the read section. No node references may be retained
    /// past this point.
    #[inline]
    pub fn exit_read(&self) {
        self.slot.exit();
    }

    /// Weakly-consistent iteration over all Active orders.
    ///
    /// Bids are visited in descending price order, then asks ascending;
    /// within a level, FIFO order. Orders inserted or retired
    /// concurrently with the walk may or may not appear, but every
    /// order visited was linked and Active at some instant during the
    /// walk.
    pub fn snapshot_active<F>(&self, mut visit: F)
    where
        F: FnMut(i64, &OrderSlot),
    {
        self.enter_read();
        let arena = &self.shared.arena;

        // Bids descending (highest first)
        self.shared.book.bids.for_each_descending(|price, level| {
            level.for_each_active(arena, |slot| visit(price, slot));
            true
        });
        // Asks ascending (lowest first)
        self.shared.book.asks.for_each_ascending(|price, level| {
            level.for_each_active(arena, |slot| visit(price, slot));
            true
        });

        self.exit_read();
    }
}
