//! Order side, type, and status enums shared across the engine.
//!
//! All three are `#[repr(u8)]` so they can be stored in the atomic
//! byte fields of an order slot and reloaded by concurrent readers.

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Bid = 0,
    /// Sell side (asks)
    Ask = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    #[inline]
    pub(crate) const fn from_raw(v: u8) -> Self {
        match v {
            0 => Side::Bid,
            _ => Side::Ask,
        }
    }
}

/// Order type determines matching behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderType {
    /// Limit order - rests in book if not fully matched (default)
    #[default]
    Limit = 0,
    /// Market order - matches at any price, never rests
    Market = 1,
    /// Immediate-Or-Cancel - cancel any unfilled portion immediately
    Ioc = 2,
    /// Fill-Or-Kill - all-or-nothing execution, reject if can't fully fill
    Fok = 3,
    /// Post-Only - rejected outright if it would cross the book
    PostOnly = 4,
}

impl OrderType {
    #[inline]
    pub(crate) const fn from_raw(v: u8) -> Self {
        match v {
            0 => OrderType::Limit,
            1 => OrderType::Market,
            2 => OrderType::Ioc,
            3 => OrderType::Fok,
            _ => OrderType::PostOnly,
        }
    }
}

/// Lifecycle status of an order record.
///
/// `Active` orders are either resting in a price level or are the
/// in-flight placement currently being matched. `Inactive` orders are
/// on their way through the retire ring back to the pool; snapshot
/// readers skip them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderStatus {
    Active = 0,
    Inactive = 1,
}

impl OrderStatus {
    #[inline]
    pub(crate) const fn from_raw(v: u8) -> Self {
        match v {
            0 => OrderStatus::Active,
            _ => OrderStatus::Inactive,
        }
    }
}
