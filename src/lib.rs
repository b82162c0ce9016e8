//! # epoch-lob
//!
//! An in-memory limit order book matching engine built for
//! single-writer, low-latency operation with concurrent lock-free
//! snapshot readers.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one thread owns all book mutation (no locks)
//! - **Arena Allocation**: order records are preallocated slots
//!   addressed by stable `u32` indices; the hot path never allocates
//! - **Price-Time Priority**: a red-black price index over intrusive
//!   FIFO levels
//! - **Epoch Reclamation**: retired records flow through an SPSC ring
//!   and return to the pool only after every concurrent reader has
//!   moved past their retire epoch (RCU-style)
//!
//! ## Architecture
//!
//! ```text
//! place/cancel --> [Matcher (single thread)] --> [RetireRing] --> [Pool]
//!                        |                            ^
//!                  [bid/ask PriceTree]           epoch-gated drain
//!                        |
//!                  [snapshot Readers]  (any number, lock-free)
//! ```
//!
//! ## Order Types
//!
//! Limit rests its residual; Market and IOC cancel theirs; FOK runs a
//! dry-run liquidity pre-check and fills entirely or not at all;
//! PostOnly is rejected outright if it would cross. Rejections are not
//! errors - inspect the returned handle's status and fill.

pub mod arena;
pub mod book;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod level;
pub mod matching;
pub mod ring;
pub mod tree;
pub mod types;

// Re-exports for convenience
pub use arena::{OrderHandle, OrderSlot};
pub use book::Reader;
pub use engine::{Engine, EngineConfig};
pub use error::Error;
pub use types::{OrderStatus, OrderType, Side};
