//! End-to-end scenario tests: placement dispositions, cancel paths,
//! epoch-gated reclamation, and snapshot visibility.

use epoch_lob::{Engine, EngineConfig, OrderStatus, OrderType, Side};

fn engine(pool: u32, ring: u64) -> Engine {
    Engine::new(EngineConfig {
        pool_capacity: pool,
        retire_ring_capacity: ring,
    })
    .unwrap()
}

/// Collect one snapshot as (price, id, qty, side) tuples in visit order.
fn snapshot(engine: &Engine) -> Vec<(i64, u64, i64, Side)> {
    let reader = engine.reader();
    let mut seen = Vec::new();
    reader.snapshot_active(|price, order| {
        seen.push((price, order.id(), order.qty(), order.side()));
    });
    seen
}

#[test]
fn simple_cross_consumes_both_records() {
    let mut eng = engine(16, 16);

    let bid = eng.place(Side::Bid, OrderType::Limit, 100, 1, 10, 1).unwrap();
    let ask = eng.place(Side::Ask, OrderType::Limit, 100, 2, 10, 2).unwrap();

    for h in [bid, ask] {
        let order = eng.order(h);
        assert_eq!(order.filled(), 10);
        assert_eq!(order.qty(), 0);
        assert_eq!(order.status(), OrderStatus::Inactive);
    }

    // Both levels gone, both records pending reclamation
    assert_eq!(eng.level_count(Side::Bid), 0);
    assert_eq!(eng.level_count(Side::Ask), 0);
    assert_eq!(eng.pending_retired(), 2);
    assert_eq!(eng.last_seq(), 2);
    assert!(snapshot(&eng).is_empty());
}

#[test]
fn ioc_partial_fill_cancels_residual() {
    let mut eng = engine(16, 16);

    let ask = eng.place(Side::Ask, OrderType::Limit, 100, 1, 5, 1).unwrap();
    let bid = eng.place(Side::Bid, OrderType::Ioc, 100, 2, 10, 2).unwrap();

    let ask_order = eng.order(ask);
    assert_eq!(ask_order.filled(), 5);
    assert_eq!(ask_order.qty(), 0);
    assert_eq!(ask_order.status(), OrderStatus::Inactive);

    let bid_order = eng.order(bid);
    assert_eq!(bid_order.filled(), 5);
    assert_eq!(bid_order.qty(), 5);
    assert_eq!(bid_order.status(), OrderStatus::Inactive);

    // No resting liquidity remains on either side
    assert_eq!(eng.order_count(), 0);
    assert!(snapshot(&eng).is_empty());
}

#[test]
fn fok_rejection_leaves_book_untouched() {
    let mut eng = engine(16, 16);

    let ask = eng.place(Side::Ask, OrderType::Limit, 100, 1, 5, 1).unwrap();
    let bid = eng.place(Side::Bid, OrderType::Fok, 100, 2, 10, 2).unwrap();

    // The resting ask is still live and the level still present
    let ask_order = eng.order(ask);
    assert_eq!(ask_order.status(), OrderStatus::Active);
    assert_eq!(ask_order.qty(), 5);
    assert_eq!(eng.depth_at(Side::Ask, 100), 5);

    // The FOK carries the rejection in its handle
    let bid_order = eng.order(bid);
    assert_eq!(bid_order.filled(), 0);
    assert_eq!(bid_order.qty(), 10);
    assert_eq!(bid_order.status(), OrderStatus::Inactive);
}

#[test]
fn post_only_rests_when_not_crossing() {
    let mut eng = engine(16, 16);

    eng.place(Side::Ask, OrderType::Limit, 100, 1, 5, 1).unwrap();
    let bid = eng
        .place(Side::Bid, OrderType::PostOnly, 99, 2, 5, 2)
        .unwrap();

    assert_eq!(eng.order(bid).status(), OrderStatus::Active);
    assert_eq!(eng.best_bid(), Some(99));
    assert_eq!(eng.best_ask(), Some(100));

    let seen = snapshot(&eng);
    assert_eq!(
        seen,
        vec![(99, 2, 5, Side::Bid), (100, 1, 5, Side::Ask)],
    );
}

#[test]
fn cancel_then_reclaim_waits_for_live_reader() {
    let mut eng = engine(16, 16);

    let o1 = eng.place(Side::Bid, OrderType::Limit, 100, 1, 5, 1).unwrap();

    // Reader enters before the cancel: it may still walk onto o1
    let reader = eng.reader();
    reader.enter_read();

    eng.cancel(100, o1, Side::Bid).unwrap();
    assert_eq!(eng.order(o1).status(), OrderStatus::Inactive);
    assert_eq!(eng.pending_retired(), 1);

    // Reader is still inside its read section: nothing may be reclaimed
    let released = eng.advance_epoch_and_reclaim(&[&reader]);
    assert_eq!(released, 0);
    assert_eq!(eng.pending_retired(), 1);
    assert_eq!(eng.orders_in_use(), 1);

    // Once the reader leaves, the record can return to the pool
    reader.exit_read();
    let released = eng.advance_epoch_and_reclaim(&[&reader]);
    assert_eq!(released, 1);
    assert_eq!(eng.pending_retired(), 0);
    assert_eq!(eng.orders_in_use(), 0);
}

#[test]
fn fifo_survives_middle_cancel() {
    let mut eng = engine(16, 16);

    eng.place(Side::Bid, OrderType::Limit, 100, 1, 10, 1).unwrap();
    eng.place(Side::Bid, OrderType::Limit, 100, 2, 20, 2).unwrap();
    eng.place(Side::Bid, OrderType::Limit, 100, 3, 30, 3).unwrap();

    let canceled = eng.cancel_by_id(2).unwrap();
    assert!(canceled.is_some());

    let seen = snapshot(&eng);
    assert_eq!(seen, vec![(100, 1, 10, Side::Bid), (100, 3, 30, Side::Bid)]);
    assert_eq!(eng.depth_at(Side::Bid, 100), 40);
}

// ---------------------------------------------------------------------
// Boundary behaviors
// ---------------------------------------------------------------------

#[test]
fn market_against_empty_book_retires_immediately() {
    let mut eng = engine(16, 16);

    for (otype, id) in [(OrderType::Market, 1), (OrderType::Ioc, 2)] {
        let h = eng.place(Side::Bid, otype, 100, id, 10, id).unwrap();
        let order = eng.order(h);
        assert_eq!(order.filled(), 0);
        assert_eq!(order.status(), OrderStatus::Inactive);
    }
    assert_eq!(eng.pending_retired(), 2);
}

#[test]
fn fok_against_empty_book_rejects_immediately() {
    let mut eng = engine(16, 16);

    let h = eng.place(Side::Ask, OrderType::Fok, 100, 1, 10, 1).unwrap();
    let order = eng.order(h);
    assert_eq!(order.filled(), 0);
    assert_eq!(order.qty(), 10);
    assert_eq!(order.status(), OrderStatus::Inactive);
}

#[test]
fn exact_fill_cross_retires_both_sides() {
    let mut eng = engine(16, 16);

    let ask = eng.place(Side::Ask, OrderType::Limit, 100, 1, 7, 1).unwrap();
    let bid = eng.place(Side::Bid, OrderType::Limit, 100, 2, 7, 2).unwrap();

    for h in [ask, bid] {
        assert_eq!(eng.order(h).qty(), 0);
        assert_eq!(eng.order(h).status(), OrderStatus::Inactive);
    }
    assert_eq!(eng.pending_retired(), 2);
}

#[test]
fn fok_with_exactly_enough_liquidity_fills() {
    let mut eng = engine(16, 16);

    eng.place(Side::Ask, OrderType::Limit, 100, 1, 4, 1).unwrap();
    eng.place(Side::Ask, OrderType::Limit, 101, 2, 6, 2).unwrap();
    let bid = eng.place(Side::Bid, OrderType::Fok, 101, 3, 10, 3).unwrap();

    let order = eng.order(bid);
    assert_eq!(order.filled(), 10);
    assert_eq!(order.qty(), 0);
    assert_eq!(eng.level_count(Side::Ask), 0);
}

#[test]
fn market_priced_fok_counts_all_depth() {
    let mut eng = engine(16, 16);

    eng.place(Side::Ask, OrderType::Limit, 100, 1, 4, 1).unwrap();
    eng.place(Side::Ask, OrderType::Limit, 500, 2, 6, 2).unwrap();

    // Price 0 = market-priced FOK: all opposite depth is marketable
    let bid = eng.place(Side::Bid, OrderType::Fok, 0, 3, 10, 3).unwrap();
    let order = eng.order(bid);
    assert_eq!(order.filled(), 10);
    assert_eq!(order.qty(), 0);
}

// ---------------------------------------------------------------------
// Quiescent-state invariants
// ---------------------------------------------------------------------

#[test]
fn book_never_stays_crossed_and_depths_reconcile() {
    let mut eng = engine(256, 256);

    // A fixed, churny sequence of placements
    let mut seq = 0u64;
    for i in 0..200i64 {
        seq += 1;
        let side = if i % 3 == 0 { Side::Ask } else { Side::Bid };
        let otype = match i % 5 {
            0 => OrderType::Limit,
            1 => OrderType::Ioc,
            2 => OrderType::Limit,
            3 => OrderType::PostOnly,
            _ => OrderType::Fok,
        };
        let price = 100 + (i * 7) % 13 - 6;
        let qty = 1 + (i % 9);
        let original = qty;
        let h = eng.place(side, otype, price, seq, qty, seq).unwrap();

        // Conservation: filled + remaining equals the original quantity
        let order = eng.order(h);
        assert_eq!(order.filled() + order.qty(), original);

        // Post-match quiescent state: the book is never crossed
        if let (Some(bid), Some(ask)) = (eng.best_bid(), eng.best_ask()) {
            assert!(bid < ask, "book crossed: bid {bid} >= ask {ask}");
        }

        eng.advance_epoch_and_reclaim(&[]);
    }

    // Level aggregates equal the sum of visited order quantities
    let reader = eng.reader();
    let mut sums = std::collections::HashMap::new();
    reader.snapshot_active(|price, order| {
        *sums.entry((order.side(), price)).or_insert(0i64) += order.qty();
    });
    for ((side, price), sum) in sums {
        assert_eq!(eng.depth_at(side, price), sum);
    }

    // Every acquired record is either resting or pending retirement
    assert_eq!(
        eng.orders_in_use() as u64,
        eng.order_count() as u64 + eng.pending_retired()
    );
}
