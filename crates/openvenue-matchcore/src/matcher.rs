//! Continuous price-time priority matcher.
//!
//! Matching runs in two phases so that callers can stage dependent state
//! (position updates) between them and abort without touching the book:
//!
//! ```text
//! plan_match(&book, &order)          -> MatchPlan     (read-only)
//! execute_plan(&mut book, order, ..) -> MatchOutcome  (mutates book)
//! ```
//!
//! ## Rules
//!
//! - Contra levels are walked best price first, FIFO within a level.
//! - Each fill is `min(aggressor remaining, resting remaining)`.
//! - Every fill executes at the **resting** order's price.
//! - With self-trade prevention on, resting orders of the aggressor's owner
//!   are skipped and stay in the book.

use chrono::{DateTime, Utc};
use openvenue_types::{OpenvenueError, Order, OrderId, OrderSide, Result, Trade, TradeId, UserId};
use rust_decimal::Decimal;

use crate::OrderBook;

/// One planned fill against a resting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFill {
    pub resting_id: OrderId,
    pub resting_owner: UserId,
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Read-only result of walking the book for one incoming order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchPlan {
    pub fills: Vec<PlannedFill>,
    /// Aggressor quantity left after all planned fills.
    pub remaining: Decimal,
}

impl MatchPlan {
    #[must_use]
    pub fn filled_quantity(&self) -> Decimal {
        self.fills.iter().map(|f| f.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }
}

/// Result of committing a plan.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// The aggressor after its fills.
    pub order: Order,
    pub trades: Vec<Trade>,
    /// Resting orders that were completely filled and left the book.
    pub completed: Vec<Order>,
    /// Whether the aggressor now rests in the book.
    pub rested: bool,
}

/// Walk the contra side of `book` for `order` without mutating anything.
#[must_use]
pub fn plan_match(book: &OrderBook, order: &Order, prevent_self_trade: bool) -> MatchPlan {
    let mut remaining = order.remaining();
    let mut fills = Vec::new();

    'levels: for level in book.contra_levels(order.side) {
        if remaining <= Decimal::ZERO || !order.crosses(level.price) {
            break;
        }
        for resting in &level.orders {
            if remaining <= Decimal::ZERO {
                break 'levels;
            }
            if prevent_self_trade && resting.owner == order.owner {
                continue;
            }
            let qty = remaining.min(resting.remaining());
            fills.push(PlannedFill {
                resting_id: resting.id,
                resting_owner: resting.owner.clone(),
                price: level.price,
                quantity: qty,
            });
            remaining -= qty;
        }
    }

    MatchPlan { fills, remaining }
}

/// Apply a plan produced by [`plan_match`] against the same, unchanged book.
///
/// Every planned fill is checked before the first mutation, so a stale plan
/// fails without side effects. `next_fill_seq` is the market-wide trade
/// sequence and is advanced once per trade.
pub fn execute_plan(
    book: &mut OrderBook,
    mut order: Order,
    plan: &MatchPlan,
    next_fill_seq: &mut u64,
    at: DateTime<Utc>,
) -> Result<MatchOutcome> {
    for fill in &plan.fills {
        let resting = book
            .get(&fill.resting_id)
            .ok_or(OpenvenueError::OrderNotFound(fill.resting_id))?;
        if fill.quantity > resting.remaining() || resting.side == order.side {
            return Err(OpenvenueError::Internal(format!(
                "stale match plan for resting order {}",
                fill.resting_id
            )));
        }
    }
    if plan.filled_quantity() > order.remaining() {
        return Err(OpenvenueError::Internal(format!(
            "match plan overfills order {}",
            order.id
        )));
    }

    let mut trades = Vec::with_capacity(plan.fills.len());
    let mut completed = Vec::new();

    for fill in &plan.fills {
        if let Some(done) = book.fill_resting(&fill.resting_id, fill.quantity, at)? {
            completed.push(done);
        }
        order.record_fill(fill.quantity, at)?;

        let (buy_order_id, sell_order_id, buyer, seller) = match order.side {
            OrderSide::Buy => (
                order.id,
                fill.resting_id,
                order.owner.clone(),
                fill.resting_owner.clone(),
            ),
            OrderSide::Sell => (
                fill.resting_id,
                order.id,
                fill.resting_owner.clone(),
                order.owner.clone(),
            ),
        };

        let trade = Trade {
            id: TradeId::deterministic(&order.market, *next_fill_seq),
            market: order.market.clone(),
            outcome: order.outcome.clone(),
            buy_order_id,
            sell_order_id,
            buyer,
            seller,
            aggressor: order.side,
            price: fill.price,
            quantity: fill.quantity,
            sequence: *next_fill_seq,
            executed_at: at,
        };
        tracing::debug!(
            trade_id = %trade.id,
            instrument = %book.instrument,
            price = %trade.price,
            qty = %trade.quantity,
            "Trade matched"
        );
        trades.push(trade);
        *next_fill_seq += 1;
    }

    let rested = order.remaining() > Decimal::ZERO;
    if rested {
        book.insert_order(order.clone())?;
    }

    Ok(MatchOutcome {
        order,
        trades,
        completed,
        rested,
    })
}

/// Plan and execute in one step.
pub fn match_order(
    book: &mut OrderBook,
    order: Order,
    prevent_self_trade: bool,
    next_fill_seq: &mut u64,
    at: DateTime<Utc>,
) -> Result<MatchOutcome> {
    let plan = plan_match(book, &order, prevent_self_trade);
    execute_plan(book, order, &plan, next_fill_seq, at)
}

#[cfg(test)]
mod tests {
    use openvenue_types::*;
    use rust_decimal::Decimal;

    use super::*;

    fn book() -> OrderBook {
        OrderBook::new(Instrument::new(MarketId::new("TEST"), OutcomeId::new("MAIN")))
    }

    fn order(owner: &str, side: OrderSide, price: Decimal, qty: Decimal, seq: u64) -> Order {
        let mut o = Order::dummy_limit_for_user(UserId::new(owner), side, price, qty);
        o.sequence = seq;
        o
    }

    fn run(book: &mut OrderBook, o: Order, seq: &mut u64) -> MatchOutcome {
        match_order(book, o, false, seq, Utc::now()).unwrap()
    }

    #[test]
    fn no_cross_rests() {
        let mut b = book();
        let mut seq = 0;
        run(&mut b, order("a", OrderSide::Sell, Decimal::new(101, 0), Decimal::ONE, 0), &mut seq);
        let out = run(&mut b, order("b", OrderSide::Buy, Decimal::new(99, 0), Decimal::ONE, 1), &mut seq);
        assert!(out.trades.is_empty());
        assert!(out.rested);
        assert_eq!(out.order.status, OrderStatus::Pending);
        assert_eq!(b.order_count(), 2);
        assert_eq!(seq, 0);
    }

    #[test]
    fn full_match_at_resting_price() {
        let mut b = book();
        let mut seq = 0;
        let sell = order("bob", OrderSide::Sell, Decimal::new(60, 2), Decimal::new(10, 0), 0);
        let sell_id = sell.id;
        run(&mut b, sell, &mut seq);

        let buy = order("alice", OrderSide::Buy, Decimal::new(65, 2), Decimal::new(10, 0), 1);
        let out = run(&mut b, buy, &mut seq);

        assert_eq!(out.trades.len(), 1);
        let t = &out.trades[0];
        assert_eq!(t.price, Decimal::new(60, 2), "maker price rule");
        assert_eq!(t.quantity, Decimal::new(10, 0));
        assert_eq!(t.sell_order_id, sell_id);
        assert_eq!(t.buyer, UserId::new("alice"));
        assert_eq!(t.aggressor, OrderSide::Buy);
        assert_eq!(out.order.status, OrderStatus::Filled);
        assert_eq!(out.completed.len(), 1);
        assert_eq!(out.completed[0].status, OrderStatus::Filled);
        assert!(!out.rested);
        assert!(b.is_empty());
    }

    #[test]
    fn partial_fill_aggressor_rests() {
        let mut b = book();
        let mut seq = 0;
        run(&mut b, order("bob", OrderSide::Sell, Decimal::new(50, 2), Decimal::new(4, 0), 0), &mut seq);
        let out = run(
            &mut b,
            order("alice", OrderSide::Buy, Decimal::new(50, 2), Decimal::new(10, 0), 1),
            &mut seq,
        );
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.order.status, OrderStatus::PartiallyFilled);
        assert_eq!(out.order.remaining(), Decimal::new(6, 0));
        assert!(out.rested);
        assert_eq!(b.best_bid(), Some(Decimal::new(50, 2)));
        assert_eq!(b.best_ask(), None);
    }

    #[test]
    fn sweeps_levels_best_first() {
        let mut b = book();
        let mut seq = 0;
        run(&mut b, order("s1", OrderSide::Sell, Decimal::new(103, 0), Decimal::ONE, 0), &mut seq);
        run(&mut b, order("s2", OrderSide::Sell, Decimal::new(101, 0), Decimal::ONE, 1), &mut seq);
        run(&mut b, order("s3", OrderSide::Sell, Decimal::new(102, 0), Decimal::ONE, 2), &mut seq);

        let out = run(
            &mut b,
            order("b", OrderSide::Buy, Decimal::new(102, 0), Decimal::new(5, 0), 3),
            &mut seq,
        );
        let prices: Vec<Decimal> = out.trades.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![Decimal::new(101, 0), Decimal::new(102, 0)]);
        assert_eq!(out.order.remaining(), Decimal::new(3, 0));
        assert_eq!(b.best_ask(), Some(Decimal::new(103, 0)));
        assert_eq!(b.best_bid(), Some(Decimal::new(102, 0)));
    }

    #[test]
    fn fifo_within_level() {
        let mut b = book();
        let mut seq = 0;
        let first = order("s1", OrderSide::Sell, Decimal::new(50, 2), Decimal::new(5, 0), 0);
        let second = order("s2", OrderSide::Sell, Decimal::new(50, 2), Decimal::new(5, 0), 1);
        let (first_id, second_id) = (first.id, second.id);
        run(&mut b, first, &mut seq);
        run(&mut b, second, &mut seq);

        let out = run(
            &mut b,
            order("b", OrderSide::Buy, Decimal::new(50, 2), Decimal::new(7, 0), 2),
            &mut seq,
        );
        assert_eq!(out.trades[0].sell_order_id, first_id);
        assert_eq!(out.trades[0].quantity, Decimal::new(5, 0));
        assert_eq!(out.trades[1].sell_order_id, second_id);
        assert_eq!(out.trades[1].quantity, Decimal::TWO);
        assert_eq!(b.get(&second_id).unwrap().remaining(), Decimal::new(3, 0));
    }

    #[test]
    fn trade_sequence_and_ids_advance() {
        let mut b = book();
        let mut seq = 10;
        run(&mut b, order("s", OrderSide::Sell, Decimal::ONE, Decimal::ONE, 0), &mut seq);
        run(&mut b, order("s", OrderSide::Sell, Decimal::ONE, Decimal::ONE, 1), &mut seq);
        let out = run(&mut b, order("b", OrderSide::Buy, Decimal::ONE, Decimal::TWO, 2), &mut seq);
        assert_eq!(out.trades[0].sequence, 10);
        assert_eq!(out.trades[1].sequence, 11);
        assert_eq!(
            out.trades[0].id,
            TradeId::deterministic(&MarketId::new("TEST"), 10)
        );
        assert_eq!(seq, 12);
    }

    #[test]
    fn self_trade_prevention_skips_own_orders() {
        let mut b = book();
        let mut seq = 0;
        let own = order("alice", OrderSide::Sell, Decimal::ONE, Decimal::ONE, 0);
        let own_id = own.id;
        match_order(&mut b, own, true, &mut seq, Utc::now()).unwrap();
        match_order(
            &mut b,
            order("bob", OrderSide::Sell, Decimal::ONE, Decimal::ONE, 1),
            true,
            &mut seq,
            Utc::now(),
        )
        .unwrap();

        let out = match_order(
            &mut b,
            order("alice", OrderSide::Buy, Decimal::ONE, Decimal::ONE, 2),
            true,
            &mut seq,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].seller, UserId::new("bob"));
        assert!(b.contains_order(&own_id));
    }

    #[test]
    fn self_trade_allowed_by_default() {
        let mut b = book();
        let mut seq = 0;
        run(&mut b, order("alice", OrderSide::Sell, Decimal::ONE, Decimal::ONE, 0), &mut seq);
        let out = run(&mut b, order("alice", OrderSide::Buy, Decimal::ONE, Decimal::ONE, 1), &mut seq);
        assert_eq!(out.trades.len(), 1);
    }

    #[test]
    fn plan_does_not_mutate() {
        let mut b = book();
        let mut seq = 0;
        run(&mut b, order("s", OrderSide::Sell, Decimal::ONE, Decimal::new(3, 0), 0), &mut seq);
        let before = b.snapshot();
        let plan = plan_match(&b, &order("b", OrderSide::Buy, Decimal::ONE, Decimal::TWO, 1), false);
        assert_eq!(plan.filled_quantity(), Decimal::TWO);
        assert_eq!(plan.remaining, Decimal::ZERO);
        assert_eq!(b.snapshot(), before);
    }

    #[test]
    fn stale_plan_rejected_without_mutation() {
        let mut b = book();
        let mut seq = 0;
        let resting = order("s", OrderSide::Sell, Decimal::ONE, Decimal::ONE, 0);
        let resting_id = resting.id;
        run(&mut b, resting, &mut seq);

        let buy = order("b", OrderSide::Buy, Decimal::ONE, Decimal::ONE, 1);
        let plan = plan_match(&b, &buy, false);
        b.cancel_order(&resting_id).unwrap();

        let err = execute_plan(&mut b, buy, &plan, &mut seq, Utc::now()).unwrap_err();
        assert!(matches!(err, OpenvenueError::OrderNotFound(_)));
        assert!(b.is_empty());
        assert_eq!(seq, 0);
    }

    #[test]
    fn random_flow_conserves_quantity() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let mut b = book();
        let mut seq = 0;
        let mut submitted = Decimal::ZERO;
        let mut traded = Decimal::ZERO;
        let mut completed_or_done = Decimal::ZERO;

        for i in 0..400u64 {
            let side = if rng.gen_bool(0.5) { OrderSide::Buy } else { OrderSide::Sell };
            let price = Decimal::new(rng.gen_range(40..=60), 2);
            let qty = Decimal::new(rng.gen_range(1..=20), 0);
            submitted += qty;
            let out = run(&mut b, order(&format!("u{}", i % 7), side, price, qty, i), &mut seq);
            for t in &out.trades {
                assert!(t.quantity > Decimal::ZERO);
                traded += t.quantity;
            }
            for c in &out.completed {
                assert_eq!(c.remaining(), Decimal::ZERO);
                completed_or_done += c.quantity;
            }
            if !out.rested {
                completed_or_done += out.order.quantity;
            }
            if let (Some(bid), Some(ask)) = (b.best_bid(), b.best_ask()) {
                assert!(bid < ask, "book must never stay crossed");
            }
        }

        // Each trade consumes quantity from exactly two orders.
        let resting: Decimal = b
            .snapshot()
            .bids
            .iter()
            .chain(b.snapshot().asks.iter())
            .map(|o| o.quantity)
            .sum();
        let resting_filled: Decimal = b
            .snapshot()
            .bids
            .iter()
            .chain(b.snapshot().asks.iter())
            .map(|o| o.filled_qty)
            .sum();
        assert_eq!(submitted, resting + completed_or_done);
        assert_eq!(traded * Decimal::TWO, completed_or_done + resting_filled);
    }
}
