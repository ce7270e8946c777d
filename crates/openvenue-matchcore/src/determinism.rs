//! Determinism digests.
//!
//! Replaying the same operations on a fresh engine must reproduce the same
//! trades and the same resting books. These hashes make that comparison
//! cheap. Wall-clock timestamps are excluded; decimals are normalized so
//! that `1.0` and `1` hash the same.

use openvenue_types::{Order, Trade};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::OrderBook;

fn hash_decimal(hasher: &mut Sha256, value: Decimal) {
    hasher.update(value.normalize().to_string().as_bytes());
    hasher.update([0u8]);
}

fn finish(hasher: Sha256) -> [u8; 32] {
    let result = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&result);
    root
}

fn hash_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Compute the trade root hash over a sequence of trades.
///
/// The same trades in the same order always produce the same root.
#[must_use]
pub fn compute_trade_root(trades: &[Trade]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"openvenue:trade_root:v1:");
    hasher.update((trades.len() as u64).to_le_bytes());

    for trade in trades {
        hasher.update(trade.id.0.as_bytes());
        hash_str(&mut hasher, trade.market.as_str());
        hash_str(&mut hasher, trade.outcome.as_str());
        hasher.update(trade.buy_order_id.0.as_bytes());
        hasher.update(trade.sell_order_id.0.as_bytes());
        hash_str(&mut hasher, trade.buyer.as_str());
        hash_str(&mut hasher, trade.seller.as_str());
        hash_decimal(&mut hasher, trade.price);
        hash_decimal(&mut hasher, trade.quantity);
        hasher.update(trade.sequence.to_le_bytes());
    }

    finish(hasher)
}

/// Recompute the root from `trades` and compare.
#[must_use]
pub fn verify_trade_root(trades: &[Trade], expected_root: &[u8; 32]) -> bool {
    compute_trade_root(trades) == *expected_root
}

fn hash_order(hasher: &mut Sha256, order: &Order) {
    hasher.update(order.id.0.as_bytes());
    hash_str(hasher, order.owner.as_str());
    hasher.update([u8::from(order.side == openvenue_types::OrderSide::Buy)]);
    hash_decimal(hasher, order.price);
    hash_decimal(hasher, order.quantity);
    hash_decimal(hasher, order.filled_qty);
    hasher.update(order.sequence.to_le_bytes());
}

/// Digest of every resting order in priority order.
#[must_use]
pub fn book_digest(book: &OrderBook) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"openvenue:book:v1:");
    hash_str(&mut hasher, book.instrument.market.as_str());
    hash_str(&mut hasher, book.instrument.outcome.as_str());
    for level in book.bid_levels() {
        for order in &level.orders {
            hash_order(&mut hasher, order);
        }
    }
    hasher.update(b"|asks|");
    for level in book.ask_levels() {
        for order in &level.orders {
            hash_order(&mut hasher, order);
        }
    }
    finish(hasher)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use openvenue_types::*;
    use rust_decimal::Decimal;

    use super::*;

    fn make_trade(fill_seq: u64) -> Trade {
        let market = MarketId::new("TEST");
        Trade {
            id: TradeId::deterministic(&market, fill_seq),
            market,
            outcome: OutcomeId::new("MAIN"),
            buy_order_id: OrderId::from_bytes([1; 16]),
            sell_order_id: OrderId::from_bytes([3; 16]),
            buyer: UserId::new("alice"),
            seller: UserId::new("bob"),
            aggressor: OrderSide::Buy,
            price: Decimal::new(50000, 0),
            quantity: Decimal::ONE,
            sequence: fill_seq,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn same_trades_same_root() {
        let trades = vec![make_trade(0), make_trade(1)];
        assert_eq!(compute_trade_root(&trades), compute_trade_root(&trades));
        assert_eq!(compute_trade_root(&[]), compute_trade_root(&[]));
    }

    #[test]
    fn order_matters() {
        let t1 = make_trade(0);
        let t2 = make_trade(1);
        let root_ab = compute_trade_root(&[t1.clone(), t2.clone()]);
        let root_ba = compute_trade_root(&[t2, t1]);
        assert_ne!(root_ab, root_ba, "Order of trades must affect root hash");
    }

    #[test]
    fn timestamps_do_not_affect_root() {
        let a = make_trade(0);
        let mut b = a.clone();
        b.executed_at = a.executed_at + chrono::Duration::seconds(30);
        assert_eq!(compute_trade_root(&[a]), compute_trade_root(&[b]));
    }

    #[test]
    fn decimal_scale_does_not_affect_root() {
        let a = make_trade(0);
        let mut b = a.clone();
        b.quantity = Decimal::new(10, 1);
        assert_eq!(compute_trade_root(&[a]), compute_trade_root(&[b]));
    }

    #[test]
    fn verify_roots() {
        let trades = vec![make_trade(0)];
        let root = compute_trade_root(&trades);
        assert!(verify_trade_root(&trades, &root));
        assert!(!verify_trade_root(&trades, &[0xAB; 32]));
    }

    #[test]
    fn book_digest_tracks_contents() {
        let instrument = Instrument::new(MarketId::new("TEST"), OutcomeId::new("MAIN"));
        let mut book = OrderBook::new(instrument.clone());
        let empty = book_digest(&book);

        let order = Order::dummy_limit_for_user(
            UserId::new("alice"),
            OrderSide::Buy,
            Decimal::ONE,
            Decimal::ONE,
        );
        let id = order.id;
        book.insert_order(order).unwrap();
        let with_order = book_digest(&book);
        assert_ne!(empty, with_order);

        book.cancel_order(&id).unwrap();
        assert_eq!(book_digest(&book), empty);
        assert_eq!(book_digest(&OrderBook::new(instrument)), empty);
    }
}
