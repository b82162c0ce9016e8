//! Engine - the caller-facing facade over the matching core.
//!
//! Owns the matcher (the sole writer) and hands out snapshot readers.
//! All shared state lives behind an `Arc` so readers stay valid while
//! the matcher runs; the `&mut self` receivers on mutating operations
//! are the compile-time enforcement of the single-writer model.

use std::sync::Arc;

use tracing::debug;

use crate::arena::{OrderHandle, OrderSlot};
use crate::book::{Reader, Shared};
use crate::error::Error;
use crate::matching::Matcher;
use crate::types::{OrderType, Side};

/// Construction-time sizing. Running out of either capacity at runtime
/// is a fatal error, so size both to the workload's peak.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Number of preallocated order records
    pub pool_capacity: u32,
    /// Retire ring capacity; must be a nonzero power of two
    pub retire_ring_capacity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 1 << 16,
            retire_ring_capacity: 1 << 15,
        }
    }
}

/// The matching engine. One value, one writer thread.
#[derive(Debug)]
pub struct Engine {
    matcher: Matcher,
}

impl Engine {
    /// Build an engine from the given configuration.
    pub fn new(config: EngineConfig) -> Result<Self, Error> {
        if config.retire_ring_capacity == 0 || !config.retire_ring_capacity.is_power_of_two() {
            return Err(Error::InvalidCapacity(config.retire_ring_capacity));
        }
        debug!(
            pool_capacity = config.pool_capacity,
            retire_ring_capacity = config.retire_ring_capacity,
            "engine constructed"
        );
        let shared = Arc::new(Shared::new(config.pool_capacity));
        Ok(Self {
            matcher: Matcher::new(shared, config.retire_ring_capacity),
        })
    }

    /// Place an order per the placement pipeline: FOK pre-check,
    /// matching, then rest or retire the residual by order type.
    ///
    /// `id` is caller-assigned and not validated; `seq` must be
    /// monotonic by caller contract and is recorded at acceptance.
    /// Type rejections are reported through the handle (Inactive,
    /// `filled == 0`), not as errors.
    #[inline]
    pub fn place(
        &mut self,
        side: Side,
        otype: OrderType,
        price: i64,
        id: u64,
        qty: i64,
        seq: u64,
    ) -> Result<OrderHandle, Error> {
        self.matcher.place(side, otype, price, id, qty, seq)
    }

    /// Cancel a known resting order at (price, side).
    ///
    /// Undefined if the handle is not currently linked there; see the
    /// cancel contract in the crate docs.
    #[inline]
    pub fn cancel(&mut self, price: i64, handle: OrderHandle, side: Side) -> Result<(), Error> {
        self.matcher.cancel(price, handle, side)
    }

    /// Cancel by caller-assigned id, if such an order is resting.
    #[inline]
    pub fn cancel_by_id(&mut self, id: u64) -> Result<Option<OrderHandle>, Error> {
        self.matcher.cancel_by_id(id)
    }

    /// Advance the global epoch and reclaim retired orders that no
    /// registered reader can still observe. Returns the number of
    /// records returned to the pool.
    #[inline]
    pub fn advance_epoch_and_reclaim(&mut self, readers: &[&Reader]) -> usize {
        self.matcher.advance_epoch_and_reclaim(readers)
    }

    /// Register a snapshot reader. Each reading thread needs its own.
    pub fn reader(&self) -> Reader {
        Reader::new(Arc::clone(self.matcher.shared()))
    }

    /// Inspect an order record by handle.
    #[inline]
    pub fn order(&self, handle: OrderHandle) -> &OrderSlot {
        self.matcher.shared().arena.slot(handle.0)
    }

    // ------------------------------------------------------------------
    // Book inspection
    // ------------------------------------------------------------------

    /// Best bid price (highest buy price)
    #[inline]
    pub fn best_bid(&self) -> Option<i64> {
        self.matcher.shared().book.best_bid()
    }

    /// Best ask price (lowest sell price)
    #[inline]
    pub fn best_ask(&self) -> Option<i64> {
        self.matcher.shared().book.best_ask()
    }

    /// Spread (best ask - best bid)
    #[inline]
    pub fn spread(&self) -> Option<i64> {
        self.matcher.shared().book.spread()
    }

    /// Total resting quantity at a price level (0 if absent)
    #[inline]
    pub fn depth_at(&self, side: Side, price: i64) -> i64 {
        self.matcher.shared().book.depth_at(side, price)
    }

    /// Number of price levels on a side
    pub fn level_count(&self, side: Side) -> usize {
        self.matcher.shared().book.tree(side).len()
    }

    /// Number of orders currently resting in the book
    #[inline]
    pub fn order_count(&self) -> usize {
        self.matcher.resting_count()
    }

    /// Number of retired orders awaiting reclamation
    #[inline]
    pub fn pending_retired(&self) -> u64 {
        self.matcher.pending_retired()
    }

    /// Number of live (acquired) order records
    #[inline]
    pub fn orders_in_use(&self) -> u32 {
        self.matcher.shared().arena.in_use()
    }

    /// Sequence number of the most recently accepted placement
    #[inline]
    pub fn last_seq(&self) -> u64 {
        self.matcher.shared().book.last_seq()
    }

    // ------------------------------------------------------------------
    // Operational helpers
    // ------------------------------------------------------------------

    /// Pre-fault arena pages so the hot path never takes a page fault.
    pub fn warm_up(&mut self) {
        self.matcher.shared().arena.warm_up();
    }

    /// Pin the current (matcher) thread to the last available CPU core.
    ///
    /// The last core is typically the one isolated from OS interrupts.
    pub fn pin_to_core(&self) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last_core) = core_ids.last() {
                core_affinity::set_for_current(*last_core);
            }
        }
    }

    /// Compute a hash of the current book state (determinism testing).
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.best_bid().hash(&mut hasher);
        self.best_ask().hash(&mut hasher);
        self.last_seq().hash(&mut hasher);
        self.order_count().hash(&mut hasher);
        self.orders_in_use().hash(&mut hasher);
        hasher.finish()
    }
}
