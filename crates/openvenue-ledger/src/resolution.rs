//! Market settlement: closes every open position of a market at its
//! outcome's settlement price.

use std::collections::BTreeMap;

use openvenue_types::{MarketId, OpenvenueError, OutcomeId, Position, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::PositionLedger;

/// What a settlement did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    /// Positions that were open and are now flat.
    pub positions_settled: usize,
    /// Realized P&L booked by the settlement, summed over users.
    pub realized_pnl: Decimal,
}

impl PositionLedger {
    /// Close every open position in `market` at `settlement_prices[outcome]`.
    ///
    /// Settlement prices may be zero (a losing prediction outcome), so the
    /// closing fill bypasses the positive-price check of ordinary fills.
    ///
    /// # Errors
    /// `Internal` if an open position's outcome has no settlement price,
    /// `ArithmeticOverflow` on overflow. The ledger is unchanged on error.
    pub fn settle_market(
        &mut self,
        market: &MarketId,
        settlement_prices: &BTreeMap<OutcomeId, Decimal>,
    ) -> Result<SettlementSummary> {
        let open: Vec<(&Position, Decimal)> = self
            .positions_where(|i| i.market == *market)
            .filter(|p| !p.is_flat())
            .map(|p| {
                let price = settlement_prices.get(&p.instrument.outcome).copied().ok_or_else(|| {
                    OpenvenueError::Internal(format!("no settlement price for {}", p.instrument))
                })?;
                Ok((p, price))
            })
            .collect::<Result<_>>()?;

        let mut summary = SettlementSummary::default();
        let mut settled = Vec::with_capacity(open.len());
        for (current, price) in open {
            let closed = close_at(current, price)?;
            summary.realized_pnl = summary
                .realized_pnl
                .checked_add(closed.realized_pnl - current.realized_pnl)
                .ok_or(OpenvenueError::ArithmeticOverflow { op: "settlement pnl" })?;
            settled.push(closed);
        }

        summary.positions_settled = settled.len();
        for position in settled {
            self.store(position);
        }

        tracing::info!(
            market = %market,
            positions = summary.positions_settled,
            pnl = %summary.realized_pnl,
            "Market settled"
        );
        Ok(summary)
    }
}

/// Flatten `position` at `price`, booking the realized P&L.
fn close_at(position: &Position, price: Decimal) -> Result<Position> {
    let pnl = (price - position.avg_entry_price)
        .checked_mul(position.quantity)
        .ok_or(OpenvenueError::ArithmeticOverflow { op: "settlement pnl" })?;
    let mut closed = position.clone();
    closed.realized_pnl = position
        .realized_pnl
        .checked_add(pnl)
        .ok_or(OpenvenueError::ArithmeticOverflow { op: "settlement pnl" })?;
    closed.quantity = Decimal::ZERO;
    closed.avg_entry_price = Decimal::ZERO;
    Ok(closed)
}

#[cfg(test)]
mod tests {
    use openvenue_types::{Instrument, UserId};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn prices(yes: &str, no: &str) -> BTreeMap<OutcomeId, Decimal> {
        BTreeMap::from([
            (OutcomeId::new("YES"), dec(yes)),
            (OutcomeId::new("NO"), dec(no)),
        ])
    }

    #[test]
    fn winners_and_losers_settle() {
        let market = MarketId::new("ELECTION");
        let yes = Instrument::new(market.clone(), OutcomeId::new("YES"));
        let mut ledger = PositionLedger::new();
        let (alice, bob) = (UserId::new("alice"), UserId::new("bob"));
        ledger.apply_fill(&alice, &yes, dec("100"), dec("0.60")).unwrap();
        ledger.apply_fill(&bob, &yes, dec("-100"), dec("0.60")).unwrap();

        let summary = ledger.settle_market(&market, &prices("1", "0")).unwrap();
        assert_eq!(summary.positions_settled, 2);
        assert_eq!(summary.realized_pnl, Decimal::ZERO);

        let a = ledger.position(&alice, &yes).unwrap();
        let b = ledger.position(&bob, &yes).unwrap();
        assert!(a.is_flat() && b.is_flat());
        assert_eq!(a.realized_pnl, dec("40"));
        assert_eq!(b.realized_pnl, dec("-40"));
    }

    #[test]
    fn losing_outcome_settles_at_zero() {
        let market = MarketId::new("ELECTION");
        let no = Instrument::new(market.clone(), OutcomeId::new("NO"));
        let mut ledger = PositionLedger::new();
        let carol = UserId::new("carol");
        ledger.apply_fill(&carol, &no, dec("10"), dec("0.30")).unwrap();
        ledger.settle_market(&market, &prices("1", "0")).unwrap();
        assert_eq!(ledger.position(&carol, &no).unwrap().realized_pnl, dec("-3"));
    }

    #[test]
    fn other_markets_untouched() {
        let market = MarketId::new("A");
        let other = Instrument::new(MarketId::new("B"), OutcomeId::new("YES"));
        let mut ledger = PositionLedger::new();
        let dave = UserId::new("dave");
        ledger.apply_fill(&dave, &other, dec("1"), dec("0.5")).unwrap();
        let summary = ledger.settle_market(&market, &prices("1", "0")).unwrap();
        assert_eq!(summary.positions_settled, 0);
        assert_eq!(ledger.position(&dave, &other).unwrap().quantity, dec("1"));
    }

    #[test]
    fn missing_price_is_an_error() {
        let market = MarketId::new("M");
        let maybe = Instrument::new(market.clone(), OutcomeId::new("MAYBE"));
        let mut ledger = PositionLedger::new();
        let erin = UserId::new("erin");
        ledger.apply_fill(&erin, &maybe, dec("1"), dec("0.5")).unwrap();
        assert!(ledger.settle_market(&market, &prices("1", "0")).is_err());
        assert_eq!(ledger.position(&erin, &maybe).unwrap().quantity, dec("1"));
    }
}
