//! Audit events emitted by the engine after each committed state change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    LiquidityReceipt, MarketId, MarketStatus, OrderId, PoolId, RemovalReceipt, Resolution,
    SwapReceipt, Trade, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    MarketCreated {
        market: MarketId,
    },
    MarketStatusChanged {
        market: MarketId,
        from: MarketStatus,
        to: MarketStatus,
    },
    MarketResolved {
        market: MarketId,
        resolution: Resolution,
    },
    MarketRemoved {
        market: MarketId,
        routes_evicted: usize,
    },
    OrderAccepted {
        order_id: OrderId,
        market: MarketId,
        owner: UserId,
        remaining: Decimal,
    },
    OrderRejected {
        market: MarketId,
        owner: UserId,
        reason: String,
    },
    OrderCancelled {
        order_id: OrderId,
        market: MarketId,
    },
    OrderExpired {
        order_id: OrderId,
        market: MarketId,
    },
    TradeExecuted {
        trade: Trade,
    },
    PoolCreated {
        pool: PoolId,
    },
    PoolPauseChanged {
        pool: PoolId,
        paused: bool,
    },
    Swap {
        receipt: SwapReceipt,
    },
    LiquidityAdded {
        receipt: LiquidityReceipt,
    },
    LiquidityRemoved {
        receipt: RemovalReceipt,
    },
}

impl AuditEvent {
    /// Short stable name, used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MarketCreated { .. } => "market_created",
            Self::MarketStatusChanged { .. } => "market_status_changed",
            Self::MarketResolved { .. } => "market_resolved",
            Self::MarketRemoved { .. } => "market_removed",
            Self::OrderAccepted { .. } => "order_accepted",
            Self::OrderRejected { .. } => "order_rejected",
            Self::OrderCancelled { .. } => "order_cancelled",
            Self::OrderExpired { .. } => "order_expired",
            Self::TradeExecuted { .. } => "trade_executed",
            Self::PoolCreated { .. } => "pool_created",
            Self::PoolPauseChanged { .. } => "pool_pause_changed",
            Self::Swap { .. } => "swap",
            Self::LiquidityAdded { .. } => "liquidity_added",
            Self::LiquidityRemoved { .. } => "liquidity_removed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serde_tag() {
        let ev = AuditEvent::OrderCancelled {
            order_id: OrderId::from_bytes([9; 16]),
            market: MarketId::new("M"),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(&format!("\"event\":\"{}\"", ev.kind())));
    }
}
