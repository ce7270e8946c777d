//! Order types for the continuous double auction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Instrument, MarketId, OpenvenueError, OrderId, OutcomeId, Result, UserId};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// `+1` for buys, `-1` for sells. Used to sign position deltas.
    #[must_use]
    pub fn sign(self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Lifecycle status of an order.
///
/// `Filled`, `Cancelled`, `Rejected` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A limit order owned by a market shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub market: MarketId,
    pub outcome: OutcomeId,
    pub owner: UserId,
    pub side: OrderSide,
    pub price: Decimal,
    /// Original quantity.
    pub quantity: Decimal,
    pub filled_qty: Decimal,
    pub status: OrderStatus,
    /// Per-market arrival sequence; breaks ties at equal price.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Order {
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.quantity - self.filled_qty
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.filled_qty >= self.quantity
    }

    #[must_use]
    pub fn fill_ratio(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.filled_qty / self.quantity
        }
    }

    #[must_use]
    pub fn instrument(&self) -> Instrument {
        Instrument::new(self.market.clone(), self.outcome.clone())
    }

    /// Whether this order is willing to trade against a resting order at `price`.
    #[must_use]
    pub fn crosses(&self, price: Decimal) -> bool {
        match self.side {
            OrderSide::Buy => self.price >= price,
            OrderSide::Sell => self.price <= price,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    /// Record a fill of `qty` and advance the status.
    ///
    /// # Errors
    /// `AlreadyTerminal` if the order is terminal, `Validation` if `qty` is
    /// not positive or exceeds the remaining quantity.
    pub fn record_fill(&mut self, qty: Decimal, at: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(OpenvenueError::AlreadyTerminal {
                order_id: self.id,
                status: self.status,
            });
        }
        if qty <= Decimal::ZERO || qty > self.remaining() {
            return Err(OpenvenueError::Validation {
                reason: format!(
                    "fill of {qty} invalid for order {} with {} remaining",
                    self.id,
                    self.remaining()
                ),
            });
        }
        self.filled_qty += qty;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = at;
        Ok(())
    }

    /// Move a live order to a terminal status other than `Filled`.
    ///
    /// # Errors
    /// `AlreadyTerminal` if the order already reached a terminal state.
    pub fn close(&mut self, status: OrderStatus, at: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(OpenvenueError::AlreadyTerminal {
                order_id: self.id,
                status: self.status,
            });
        }
        debug_assert!(status.is_terminal() && status != OrderStatus::Filled);
        self.status = status;
        self.updated_at = at;
        Ok(())
    }
}

/// A request to place a limit order.
///
/// `id` is normally left empty and assigned by the engine. `outcome` may be
/// omitted for single-outcome markets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub id: Option<OrderId>,
    pub market: MarketId,
    pub outcome: Option<OutcomeId>,
    pub owner: UserId,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OrderRequest {
    #[must_use]
    pub fn limit(
        market: impl Into<MarketId>,
        owner: impl Into<UserId>,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            id: None,
            market: market.into(),
            outcome: None,
            owner: owner.into(),
            side,
            price,
            quantity,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn on_outcome(mut self, outcome: impl Into<OutcomeId>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Shape checks that need no market state.
    ///
    /// # Errors
    /// `Validation` if an id is empty or quantity or price is not strictly
    /// positive.
    pub fn validate_shape(&self) -> Result<()> {
        let empty = [
            ("owner", self.owner.as_str()),
            ("market", self.market.as_str()),
            ("outcome", self.outcome.as_ref().map_or("-", OutcomeId::as_str)),
        ]
        .into_iter()
        .find(|(_, id)| id.is_empty());
        if let Some((field, _)) = empty {
            return Err(OpenvenueError::Validation {
                reason: format!("{field} id must not be empty"),
            });
        }
        if self.quantity <= Decimal::ZERO {
            return Err(OpenvenueError::Validation {
                reason: format!("quantity must be positive, got {}", self.quantity),
            });
        }
        if self.price <= Decimal::ZERO {
            return Err(OpenvenueError::Validation {
                reason: format!("price must be positive, got {}", self.price),
            });
        }
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_limit(side: OrderSide, price: Decimal, qty: Decimal) -> Self {
        Self::dummy_limit_for_user(UserId::new(format!("user-{}", OrderId::new())), side, price, qty)
    }

    pub fn dummy_limit_for_user(
        owner: UserId,
        side: OrderSide,
        price: Decimal,
        qty: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            market: MarketId::new("TEST"),
            outcome: OutcomeId::new(crate::constants::DEFAULT_OUTCOME),
            owner,
            side,
            price,
            quantity: qty,
            filled_qty: Decimal::ZERO,
            status: OrderStatus::Pending,
            sequence: 0,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }
}
