//! Market descriptors: kind, lifecycle status, resolution record and metrics.
//!
//! ```text
//! Draft ──► Active ◄──► Suspended
//!             │              │
//!             ├──► Closed ◄──┘
//!             │      ├──► Resolved
//!             │      └──► Cancelled
//!             └──► Resolved
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AssetId, MarketId, OutcomeId};

/// What a market trades and how it settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketKind {
    /// Outcomes settle at 1 (winner) or 0 (others).
    Prediction,
    /// Single-outcome market settled at the oracle price of `underlying`.
    Derivative { underlying: AssetId },
}

impl MarketKind {
    #[must_use]
    pub fn is_prediction(&self) -> bool {
        matches!(self, Self::Prediction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketStatus {
    Draft,
    Active,
    Suspended,
    Closed,
    Resolved,
    Cancelled,
}

impl MarketStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use MarketStatus::{Active, Cancelled, Closed, Draft, Resolved, Suspended};
        matches!(
            (self, next),
            (Draft | Suspended, Active)
                | (Active, Suspended | Resolved)
                | (Active | Suspended, Closed)
                | (Closed, Resolved | Cancelled)
        )
    }

    #[must_use]
    pub fn accepts_orders(self) -> bool {
        self == Self::Active
    }

    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled)
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Resolved => write!(f, "RESOLVED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Outcome of `resolve_market`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: OutcomeId,
    /// Settlement price per outcome.
    pub settlement_prices: BTreeMap<OutcomeId, Decimal>,
    /// Resting orders cancelled by the resolution.
    pub orders_cancelled: usize,
    /// Open positions closed at the settlement price.
    pub positions_settled: usize,
    /// Sum of realized P&L booked by settlement, across all users.
    pub realized_pnl: Decimal,
    pub resolved_at: DateTime<Utc>,
}

/// Running trade statistics for a market.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketMetrics {
    pub trade_count: u64,
    /// Matched quantity.
    pub volume: Decimal,
    /// Matched price × quantity.
    pub notional: Decimal,
    pub last_price: Option<Decimal>,
}

/// Read-only view of a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub id: MarketId,
    pub title: String,
    pub kind: MarketKind,
    pub outcomes: Vec<OutcomeId>,
    pub status: MarketStatus,
    pub resolution: Option<Resolution>,
    pub metrics: MarketMetrics,
    pub open_orders: usize,
}

/// Which kind of markets to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketKindFilter {
    Prediction,
    Derivative,
}

/// Filter for `list_markets`. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketFilter {
    pub status: Option<MarketStatus>,
    pub kind: Option<MarketKindFilter>,
}

impl MarketFilter {
    #[must_use]
    pub fn matches(&self, info: &MarketInfo) -> bool {
        let status_ok = self.status.is_none_or(|s| s == info.status);
        let kind_ok = match self.kind {
            None => true,
            Some(MarketKindFilter::Prediction) => info.kind.is_prediction(),
            Some(MarketKindFilter::Derivative) => !info.kind.is_prediction(),
        };
        status_ok && kind_ok
    }
}
