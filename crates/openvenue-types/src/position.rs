//! Per-user, per-instrument position.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Instrument, UserId};

/// Net holding of one user in one instrument.
///
/// `quantity` is signed: positive is long, negative is short.
/// `avg_entry_price` is zero whenever the position is flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub user: UserId,
    pub instrument: Instrument,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub realized_pnl: Decimal,
}

impl Position {
    #[must_use]
    pub fn flat(user: UserId, instrument: Instrument) -> Self {
        Self {
            user,
            instrument,
            quantity: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    #[must_use]
    pub fn is_long(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// Mark-to-market P&L of the open quantity at `mark`.
    #[must_use]
    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        (mark - self.avg_entry_price) * self.quantity
    }
}
