//! Epoch bookkeeping (RCU-style deferred reclamation).
//!
//! A single monotonic epoch counter is advanced by the reclaimer; each
//! snapshot reader publishes the epoch it entered at into its own slot
//! (0 = not reading). A retired order may return to the pool only once
//! every active reader entered strictly after the order's retire epoch.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Sentinel returned by [`min_active_epoch`] when no reader is active.
pub(crate) const NO_ACTIVE_READER: u64 = u64::MAX;

/// Process-wide monotonic epoch counter, owned by the engine.
///
/// Starts at 1: a reader slot holding 0 means "not reading", so the
/// clock must never publish 0.
#[derive(Debug)]
pub(crate) struct EpochClock {
    epoch: CachePadded<AtomicU64>,
}

impl EpochClock {
    pub(crate) fn new() -> Self {
        Self {
            epoch: CachePadded::new(AtomicU64::new(1)),
        }
    }

    #[inline]
    pub(crate) fn current(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Advance the clock; returns the new epoch.
    #[inline]
    pub(crate) fn advance(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// One reader's epoch registration slot.
///
/// Only the owning reader stores to it; the reclaimer (and anyone else)
/// may load it. Cache-padded so concurrent readers never share a line.
pub(crate) struct ReaderSlot {
    epoch: CachePadded<AtomicU64>,
}

impl ReaderSlot {
    pub(crate) fn new() -> Self {
        Self {
            epoch: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Publish the current global epoch as this reader's snapshot epoch.
    #[inline]
    pub(crate) fn enter(&self, clock: &EpochClock) {
        self.epoch.store(clock.current(), Ordering::Release);
    }

    /// Mark the reader idle.
    #[inline]
    pub(crate) fn exit(&self) {
        self.epoch.store(0, Ordering::Release);
    }

    /// The epoch this reader entered at, or 0 if idle.
    #[inline]
    pub(crate) fn snapshot_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }
}

/// Minimum non-zero reader epoch, or [`NO_ACTIVE_READER`] when idle.
pub(crate) fn min_active_epoch<'a, I>(slots: I) -> u64
where
    I: IntoIterator<Item = &'a ReaderSlot>,
{
    let mut min = NO_ACTIVE_READER;
    for slot in slots {
        let e = slot.snapshot_epoch();
        if e != 0 && e < min {
            min = e;
        }
    }
    min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_nonzero() {
        let clock = EpochClock::new();
        assert!(clock.current() > 0, "0 is the readers' idle sentinel");
    }

    #[test]
    fn test_reader_enter_exit() {
        let clock = EpochClock::new();
        for _ in 0..9 {
            clock.advance();
        }
        assert_eq!(clock.current(), 10);

        let slot = ReaderSlot::new();
        slot.enter(&clock);
        assert_eq!(slot.snapshot_epoch(), 10);
        slot.exit();
        assert_eq!(slot.snapshot_epoch(), 0);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let clock = EpochClock::new();
        let mut last = clock.current();
        for _ in 0..100 {
            let e = clock.advance();
            assert!(e > last);
            last = e;
        }
    }

    #[test]
    fn test_min_active_epoch() {
        let clock = EpochClock::new();
        let a = ReaderSlot::new();
        let b = ReaderSlot::new();
        let c = ReaderSlot::new();

        // No active reader: sentinel
        assert_eq!(min_active_epoch([&a, &b, &c]), NO_ACTIVE_READER);

        a.enter(&clock); // epoch 1
        clock.advance();
        b.enter(&clock); // epoch 2
        assert_eq!(min_active_epoch([&a, &b, &c]), 1);

        a.exit();
        assert_eq!(min_active_epoch([&a, &b, &c]), 2);

        b.exit();
        assert_eq!(min_active_epoch([&a, &b, &c]), NO_ACTIVE_READER);
    }
}
