//! Net position conservation checker.
//!
//! Every fill has a buyer and a seller, so for each instrument:
//! ```text
//! Σ_users quantity == 0
//! ```
//! A non-zero net means a fill was applied to one side only.

use std::collections::BTreeMap;

use openvenue_types::{Instrument, OpenvenueError, Result};
use rust_decimal::Decimal;

use crate::PositionLedger;

/// Validates net-zero positions per instrument.
pub struct NetPositionConservation;

impl NetPositionConservation {
    /// Signed sum of all positions in `instrument`.
    #[must_use]
    pub fn net(ledger: &PositionLedger, instrument: &Instrument) -> Decimal {
        ledger.positions_in(instrument).map(|p| p.quantity).sum()
    }

    /// Sum of long positions in `instrument`.
    #[must_use]
    pub fn open_interest(ledger: &PositionLedger, instrument: &Instrument) -> Decimal {
        ledger
            .positions_in(instrument)
            .filter(|p| p.is_long())
            .map(|p| p.quantity)
            .sum()
    }

    /// # Errors
    /// Returns [`OpenvenueError::ConservationViolation`] if the net is non-zero.
    pub fn verify(ledger: &PositionLedger, instrument: &Instrument) -> Result<()> {
        let net = Self::net(ledger, instrument);
        if !net.is_zero() {
            return Err(OpenvenueError::ConservationViolation {
                reason: format!(
                    "Instrument {instrument}: net position {net} != 0 (open interest={})",
                    Self::open_interest(ledger, instrument)
                ),
            });
        }
        Ok(())
    }

    /// Verify every instrument that has at least one position.
    pub fn verify_all(ledger: &PositionLedger) -> Result<()> {
        let mut nets: BTreeMap<&Instrument, Decimal> = BTreeMap::new();
        for p in ledger.positions_where(|_| true) {
            *nets.entry(&p.instrument).or_insert(Decimal::ZERO) += p.quantity;
        }
        match nets.into_iter().find(|(_, net)| !net.is_zero()) {
            Some((instrument, _)) => Self::verify(ledger, instrument),
            None => Ok(()),
        }
    }
}
