//! Position ledger.
//!
//! Each `(user, instrument)` holds a signed quantity, a volume-weighted
//! average entry price and the P&L realized by reducing fills:
//!
//! ```text
//! increase:  avg' = (|q|·avg + |d|·p) / |q + d|
//! reduce:    realized += (p − avg) · min(|q|, |d|) · sign(q)
//! flip:      avg' = p
//! flat:      avg' = 0
//! ```
//!
//! Batches go through [`PositionLedger::stage`] and
//! [`PositionLedger::commit`]: staging computes every resulting position
//! without touching the ledger, so a failed fill in a batch changes nothing.

use std::collections::{BTreeMap, HashMap};

use openvenue_types::{Instrument, OpenvenueError, Position, Result, Trade, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One side of an execution as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionFill {
    pub user: UserId,
    pub instrument: Instrument,
    /// Positive for a buy, negative for a sell.
    pub quantity: Decimal,
    pub price: Decimal,
}

impl PositionFill {
    #[must_use]
    pub fn new(user: UserId, instrument: Instrument, quantity: Decimal, price: Decimal) -> Self {
        Self {
            user,
            instrument,
            quantity,
            price,
        }
    }

    /// The buyer's and the seller's fill for a trade.
    #[must_use]
    pub fn from_trade(trade: &Trade) -> [Self; 2] {
        let instrument = trade.instrument();
        [
            Self::new(trade.buyer.clone(), instrument.clone(), trade.quantity, trade.price),
            Self::new(trade.seller.clone(), instrument, -trade.quantity, trade.price),
        ]
    }
}

/// Positions computed by [`PositionLedger::stage`], not yet applied.
#[derive(Debug, Clone, Default)]
#[must_use = "staged fills do nothing until committed"]
pub struct StagedFills {
    positions: BTreeMap<(UserId, Instrument), Position>,
}

impl StagedFills {
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Resulting positions, one per touched `(user, instrument)`.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }
}

/// Applies one signed fill to a position, returning the new position.
///
/// # Errors
/// `Validation` for a zero quantity or non-positive price,
/// `ArithmeticOverflow` if any intermediate overflows.
pub fn apply_to(position: &Position, quantity: Decimal, price: Decimal) -> Result<Position> {
    if quantity.is_zero() {
        return Err(OpenvenueError::Validation {
            reason: "fill quantity must be non-zero".to_string(),
        });
    }
    if price <= Decimal::ZERO {
        return Err(OpenvenueError::Validation {
            reason: format!("fill price must be positive, got {price}"),
        });
    }

    let q = position.quantity;
    let new_qty = q
        .checked_add(quantity)
        .ok_or(OpenvenueError::ArithmeticOverflow { op: "position quantity" })?;
    let mut next = position.clone();
    next.quantity = new_qty;

    let same_direction = q.is_zero() || q.is_sign_positive() == quantity.is_sign_positive();
    if same_direction {
        let held = q
            .abs()
            .checked_mul(position.avg_entry_price)
            .ok_or(OpenvenueError::ArithmeticOverflow { op: "position cost" })?;
        let added = quantity
            .abs()
            .checked_mul(price)
            .ok_or(OpenvenueError::ArithmeticOverflow { op: "fill cost" })?;
        next.avg_entry_price = held
            .checked_add(added)
            .and_then(|cost| cost.checked_div(new_qty.abs()))
            .ok_or(OpenvenueError::ArithmeticOverflow { op: "average entry" })?;
        return Ok(next);
    }

    let closed = q.abs().min(quantity.abs());
    let direction = if q.is_sign_positive() { Decimal::ONE } else { Decimal::NEGATIVE_ONE };
    let pnl = (price - position.avg_entry_price)
        .checked_mul(closed)
        .map(|v| v * direction)
        .ok_or(OpenvenueError::ArithmeticOverflow { op: "realized pnl" })?;
    next.realized_pnl = position
        .realized_pnl
        .checked_add(pnl)
        .ok_or(OpenvenueError::ArithmeticOverflow { op: "realized pnl" })?;

    if new_qty.is_zero() {
        next.avg_entry_price = Decimal::ZERO;
    } else if new_qty.is_sign_positive() != q.is_sign_positive() {
        next.avg_entry_price = price;
    }
    Ok(next)
}

/// All positions, keyed by user then instrument.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: HashMap<UserId, BTreeMap<Instrument, Position>>,
}

impl PositionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self, user: &UserId, instrument: &Instrument) -> Position {
        self.positions
            .get(user)
            .and_then(|m| m.get(instrument))
            .cloned()
            .unwrap_or_else(|| Position::flat(user.clone(), instrument.clone()))
    }

    /// Apply a single fill immediately.
    pub fn apply_fill(
        &mut self,
        user: &UserId,
        instrument: &Instrument,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Position> {
        let next = apply_to(&self.current(user, instrument), quantity, price)?;
        self.store(next.clone());
        Ok(next)
    }

    /// Compute the result of applying `fills` in order, without mutating.
    pub fn stage(&self, fills: &[PositionFill]) -> Result<StagedFills> {
        let mut staged = StagedFills::default();
        for fill in fills {
            let key = (fill.user.clone(), fill.instrument.clone());
            let base = match staged.positions.get(&key) {
                Some(p) => p.clone(),
                None => self.current(&fill.user, &fill.instrument),
            };
            let next = apply_to(&base, fill.quantity, fill.price)?;
            staged.positions.insert(key, next);
        }
        Ok(staged)
    }

    /// Apply staged positions. Infallible.
    pub fn commit(&mut self, staged: StagedFills) {
        for (_, position) in staged.positions {
            self.store(position);
        }
    }

    /// Stage and commit in one call.
    pub fn apply_fills(&mut self, fills: &[PositionFill]) -> Result<()> {
        let staged = self.stage(fills)?;
        self.commit(staged);
        Ok(())
    }

    pub(crate) fn store(&mut self, position: Position) {
        self.positions
            .entry(position.user.clone())
            .or_default()
            .insert(position.instrument.clone(), position);
    }

    #[must_use]
    pub fn position(&self, user: &UserId, instrument: &Instrument) -> Option<&Position> {
        self.positions.get(user).and_then(|m| m.get(instrument))
    }

    /// Every position of `user`, in instrument order. Empty for unknown users.
    #[must_use]
    pub fn get(&self, user: &UserId) -> Vec<Position> {
        self.positions
            .get(user)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get_all(&self) -> HashMap<UserId, Vec<Position>> {
        self.positions
            .iter()
            .map(|(user, m)| (user.clone(), m.values().cloned().collect()))
            .collect()
    }

    /// Every position held in `instrument`, including flat ones.
    pub fn positions_in<'a>(
        &'a self,
        instrument: &'a Instrument,
    ) -> impl Iterator<Item = &'a Position> + 'a {
        self.positions.values().filter_map(move |m| m.get(instrument))
    }

    /// Every position whose instrument satisfies `pred`.
    pub fn positions_where<'a, F>(&'a self, pred: F) -> impl Iterator<Item = &'a Position> + 'a
    where
        F: Fn(&Instrument) -> bool + 'a,
    {
        self.positions
            .values()
            .flat_map(|m| m.values())
            .filter(move |p| pred(&p.instrument))
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.positions.len()
    }
}
