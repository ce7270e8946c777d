//! Liquidity pool receipts, snapshots and the rebalance signal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AssetId, PoolId, UserId};

/// Result of a committed swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub pool: PoolId,
    pub trader: UserId,
    pub token_in: AssetId,
    pub token_out: AssetId,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    /// Portion of `amount_in` retained as fee.
    pub fee: Decimal,
    /// Reserves after the swap.
    pub reserve_a: Decimal,
    pub reserve_b: Decimal,
}

/// Result of `add_liquidity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityReceipt {
    pub pool: PoolId,
    pub provider: UserId,
    pub lp_minted: Decimal,
    /// Amounts actually deposited.
    pub amount_a: Decimal,
    pub amount_b: Decimal,
    /// Surplus returned to the provider under credit matching.
    pub refund_a: Decimal,
    pub refund_b: Decimal,
}

/// Result of `remove_liquidity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReceipt {
    pub pool: PoolId,
    pub provider: UserId,
    pub lp_burned: Decimal,
    pub amount_a: Decimal,
    pub amount_b: Decimal,
}

/// Cumulative pool activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub swap_count: u64,
    /// Input volume per token.
    pub volume_a: Decimal,
    pub volume_b: Decimal,
    pub fees_a: Decimal,
    pub fees_b: Decimal,
}

/// Read-only copy of a pool's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub id: PoolId,
    pub token_a: AssetId,
    pub token_b: AssetId,
    pub reserve_a: Decimal,
    pub reserve_b: Decimal,
    pub total_lp_supply: Decimal,
    pub fee_rate: Decimal,
    pub paused: bool,
    pub stats: PoolStats,
}

impl PoolSnapshot {
    /// Spot price of token A in units of token B, `None` for an empty pool.
    #[must_use]
    pub fn spot_price(&self) -> Option<Decimal> {
        if self.reserve_a.is_zero() {
            None
        } else {
            self.reserve_b.checked_div(self.reserve_a)
        }
    }
}

/// Advisory output of `check_rebalance`. Execution is left to ordinary swaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum RebalanceSignal {
    /// Spot price is within the pool's threshold of the reference.
    Balanced {
        spot: Decimal,
        target: Decimal,
        deviation: Decimal,
    },
    /// Swapping `amount_in` of `token_in` moves spot to the reference
    /// price (ignoring fees).
    RebalanceNeeded {
        spot: Decimal,
        target: Decimal,
        deviation: Decimal,
        token_in: AssetId,
        amount_in: Decimal,
    },
}

impl RebalanceSignal {
    #[must_use]
    pub fn is_needed(&self) -> bool {
        matches!(self, Self::RebalanceNeeded { .. })
    }
}
