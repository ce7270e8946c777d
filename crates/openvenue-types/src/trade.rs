//! Trade records produced by the continuous matcher.
//!
//! A [`Trade`] is the immutable record of one fill between an aggressor and
//! a resting order. It always executes at the resting order's price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Instrument, MarketId, OrderId, OrderSide, OutcomeId, TradeId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Deterministic from market + fill sequence.
    pub id: TradeId,
    pub market: MarketId,
    pub outcome: OutcomeId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer: UserId,
    pub seller: UserId,
    /// Side of the incoming (taker) order.
    pub aggressor: OrderSide,
    /// The resting (maker) order's price.
    pub price: Decimal,
    pub quantity: Decimal,
    /// Market-wide fill sequence.
    pub sequence: u64,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// Price × quantity.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    #[must_use]
    pub fn taker_order_id(&self) -> OrderId {
        match self.aggressor {
            OrderSide::Buy => self.buy_order_id,
            OrderSide::Sell => self.sell_order_id,
        }
    }

    #[must_use]
    pub fn maker_order_id(&self) -> OrderId {
        match self.aggressor {
            OrderSide::Buy => self.sell_order_id,
            OrderSide::Sell => self.buy_order_id,
        }
    }

    #[must_use]
    pub fn instrument(&self) -> Instrument {
        Instrument::new(self.market.clone(), self.outcome.clone())
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {}:{} {} {} @ {}",
            self.id, self.market, self.outcome, self.aggressor, self.quantity, self.price,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trade() -> Trade {
        let market = MarketId::new("ELECTION");
        Trade {
            id: TradeId::deterministic(&market, 0),
            market,
            outcome: OutcomeId::new("YES"),
            buy_order_id: OrderId::from_bytes([1; 16]),
            sell_order_id: OrderId::from_bytes([2; 16]),
            buyer: UserId::new("alice"),
            seller: UserId::new("bob"),
            aggressor: OrderSide::Sell,
            price: Decimal::new(60, 2),
            quantity: Decimal::new(10, 0),
            sequence: 0,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn trade_notional() {
        assert_eq!(make_trade().notional(), Decimal::new(6, 0));
    }

    #[test]
    fn maker_taker_ids() {
        let t = make_trade();
        assert_eq!(t.taker_order_id(), OrderId::from_bytes([2; 16]));
        assert_eq!(t.maker_order_id(), OrderId::from_bytes([1; 16]));
    }

    #[test]
    fn trade_display() {
        let s = format!("{}", make_trade());
        assert!(s.contains("ELECTION:YES"));
        assert!(s.contains("0.60"));
    }
}
