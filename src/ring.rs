//! Retire ring - SPSC ring of retired order slots (matcher to reclaimer).
//!
//! Fixed power-of-two capacity. Head and tail are free-running `u64`
//! counters; the slot index is `counter & mask`. The producer publishes
//! `head` with a release store after writing the slot, and the consumer
//! acquire-loads `head` before reading it, so observing `head > t`
//! implies the slot at `t & mask` carries the index the producer put
//! there. Symmetrically for `tail`. No locks, no allocation.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::arena::{SlotIndex, NIL};

/// Single-producer single-consumer ring of pending-retired order slots.
///
/// The matcher enqueues at retirement; the reclaimer dequeues when the
/// epoch protocol says the slot is unreachable. Both roles run on the
/// matcher thread in the reference configuration, but the ring stays
/// safe for a split across two threads.
#[derive(Debug)]
pub struct RetireRing {
    buf: Box<[AtomicU32]>,
    mask: u64,
    /// Producer counter (matcher writes, reclaimer acquire-loads)
    head: CachePadded<AtomicU64>,
    /// Consumer counter (reclaimer writes, matcher acquire-loads)
    tail: CachePadded<AtomicU64>,
}

impl RetireRing {
    /// Create a ring with the given power-of-two capacity.
    ///
    /// Capacity validation happens at engine construction; this
    /// constructor debug-asserts it.
    pub(crate) fn new(capacity: u64) -> Self {
        debug_assert!(capacity.is_power_of_two() && capacity > 0);
        let buf: Box<[AtomicU32]> = (0..capacity).map(|_| AtomicU32::new(NIL)).collect();
        Self {
            buf,
            mask: capacity - 1,
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue a retired slot index (producer side).
    ///
    /// Returns `false` when the ring is full; the caller treats that as
    /// a fatal sizing bug.
    #[inline]
    pub(crate) fn enqueue(&self, idx: SlotIndex) -> bool {
        let h = self.head.load(Ordering::Relaxed);
        let t = self.tail.load(Ordering::Acquire);
        if h.wrapping_sub(t) == self.capacity() {
            return false;
        }
        self.buf[(h & self.mask) as usize].store(idx, Ordering::Relaxed);
        self.head.store(h.wrapping_add(1), Ordering::Release);
        true
    }

    /// Dequeue the oldest retired slot index (consumer side).
    ///
    /// Returns `None` when the ring is empty.
    #[inline]
    pub(crate) fn dequeue(&self) -> Option<SlotIndex> {
        let t = self.tail.load(Ordering::Relaxed);
        let h = self.head.load(Ordering::Acquire);
        if t == h {
            return None;
        }
        let idx = self.buf[(t & self.mask) as usize].swap(NIL, Ordering::Relaxed);
        self.tail.store(t.wrapping_add(1), Ordering::Release);
        Some(idx)
    }

    /// Number of entries currently pending.
    #[inline]
    pub(crate) fn len(&self) -> u64 {
        self.head
            .load(Ordering::Acquire)
            .wrapping_sub(self.tail.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn capacity(&self) -> u64 {
        self.mask + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let ring = RetireRing::new(4);
        assert!(ring.enqueue(1));
        assert!(ring.enqueue(2));
        assert_eq!(ring.dequeue(), Some(1));
        assert_eq!(ring.dequeue(), Some(2));
        assert_eq!(ring.dequeue(), None);
    }

    #[test]
    fn test_full_rejects() {
        let ring = RetireRing::new(2);
        assert!(ring.enqueue(10));
        assert!(ring.enqueue(11));
        assert!(!ring.enqueue(12), "full ring must reject");
        assert_eq!(ring.len(), 2);

        assert_eq!(ring.dequeue(), Some(10));
        assert!(ring.enqueue(12), "space frees up after dequeue");
    }

    #[test]
    fn test_wraparound() {
        let ring = RetireRing::new(2);
        // Cycle through far more entries than the capacity
        for i in 0..100u32 {
            assert!(ring.enqueue(i));
            assert_eq!(ring.dequeue(), Some(i));
        }
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn test_interleaved_counts_match() {
        let ring = RetireRing::new(8);
        let mut enqueued = 0u32;
        let mut dequeued = Vec::new();

        // Deterministic interleaving: burst in, drain partially, repeat
        for round in 0..10 {
            for _ in 0..=(round % 5) {
                if ring.enqueue(enqueued) {
                    enqueued += 1;
                }
            }
            for _ in 0..(round % 3) {
                if let Some(idx) = ring.dequeue() {
                    dequeued.push(idx);
                }
            }
        }
        while let Some(idx) = ring.dequeue() {
            dequeued.push(idx);
        }

        // Dequeues appear in enqueue order and counts match
        assert_eq!(dequeued.len(), enqueued as usize);
        for (expect, got) in dequeued.iter().enumerate() {
            assert_eq!(*got, expect as u32);
        }
    }

    #[test]
    fn test_spsc_across_threads() {
        use std::sync::Arc;

        let ring = Arc::new(RetireRing::new(64));
        const COUNT: u32 = 100_000;

        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                let mut i = 0u32;
                while i < COUNT {
                    if ring.enqueue(i) {
                        i += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            })
        };

        let consumer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                let mut expect = 0u32;
                while expect < COUNT {
                    match ring.dequeue() {
                        Some(idx) => {
                            assert_eq!(idx, expect);
                            expect += 1;
                        }
                        None => std::hint::spin_loop(),
                    }
                }
            })
        };

        producer.join().unwrap();
        consumer.join().unwrap();
        assert_eq!(ring.len(), 0);
    }
}
