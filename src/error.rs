//! Fatal error kinds surfaced by the engine.
//!
//! Type rejections (PostOnly cross, FOK shortfall) are normal flow and
//! never appear here; callers detect them by inspecting the returned
//! order handle. Everything in this enum is a configuration or sizing
//! bug with no recovery path.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The order pool had no free slot at placement. Size the pool to
    /// the peak number of live orders.
    #[error("order pool exhausted (capacity {0})")]
    PoolExhausted(u32),

    /// The retire ring was full at retirement. Size the ring to the
    /// peak retire backlog between reclaim ticks.
    #[error("retire ring full (capacity {0})")]
    RetireRingFull(u64),

    /// The retire ring capacity must be a nonzero power of two.
    #[error("invalid retire ring capacity {0}: must be a nonzero power of two")]
    InvalidCapacity(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::PoolExhausted(64).to_string(),
            "order pool exhausted (capacity 64)"
        );
        assert_eq!(
            Error::RetireRingFull(32).to_string(),
            "retire ring full (capacity 32)"
        );
        assert_eq!(
            Error::InvalidCapacity(3).to_string(),
            "invalid retire ring capacity 3: must be a nonzero power of two"
        );
    }
}
