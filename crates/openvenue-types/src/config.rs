//! Configuration types for the engine, markets, pools and the risk kernel.
//!
//! All structs are serde-derived and can be loaded from JSON.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AssetId, MarketId, MarketKind, OpenvenueError, OutcomeId, PoolId, Result, constants,
};

/// What a shard does when its work queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Fail immediately with `Busy`.
    #[default]
    Reject,
    /// Wait up to `timeout_ms` for a slot, then fail with `Busy`.
    Block { timeout_ms: u64 },
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum queued mutations per market or pool shard.
    pub queue_capacity: usize,
    pub backpressure: BackpressurePolicy,
    /// Lifetime applied to orders submitted without an explicit expiry.
    /// `None` keeps such orders until filled or cancelled.
    pub default_order_ttl_secs: Option<u64>,
    pub sweep_interval_ms: u64,
    /// Capacity of the channel audit sink.
    pub audit_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: constants::DEFAULT_QUEUE_CAPACITY,
            backpressure: BackpressurePolicy::Reject,
            default_order_ttl_secs: Some(constants::DEFAULT_ORDER_TTL_SECS),
            sweep_interval_ms: constants::DEFAULT_SWEEP_INTERVAL_MS,
            audit_buffer: constants::DEFAULT_AUDIT_BUFFER,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(OpenvenueError::Configuration(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(OpenvenueError::Configuration(
                "sweep_interval_ms must be positive".to_string(),
            ));
        }
        if self.audit_buffer == 0 {
            return Err(OpenvenueError::Configuration(
                "audit_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-market configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub id: MarketId,
    pub title: String,
    pub kind: MarketKind,
    pub outcomes: Vec<OutcomeId>,
    /// Smallest accepted order quantity.
    #[serde(default)]
    pub min_order_size: Decimal,
    /// Skip resting orders owned by the aggressor instead of filling them.
    #[serde(default)]
    pub prevent_self_trade: bool,
}

impl MarketConfig {
    /// A YES/NO prediction market.
    #[must_use]
    pub fn binary(id: impl Into<MarketId>, title: impl Into<String>) -> Self {
        Self::prediction(
            id,
            title,
            vec![
                OutcomeId::new(constants::OUTCOME_YES),
                OutcomeId::new(constants::OUTCOME_NO),
            ],
        )
    }

    #[must_use]
    pub fn prediction(
        id: impl Into<MarketId>,
        title: impl Into<String>,
        outcomes: Vec<OutcomeId>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: MarketKind::Prediction,
            outcomes,
            min_order_size: Decimal::ZERO,
            prevent_self_trade: false,
        }
    }

    /// A single-outcome market settled at the oracle price of `underlying`.
    #[must_use]
    pub fn derivative(
        id: impl Into<MarketId>,
        title: impl Into<String>,
        underlying: impl Into<AssetId>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: MarketKind::Derivative {
                underlying: underlying.into(),
            },
            outcomes: vec![OutcomeId::new(constants::DEFAULT_OUTCOME)],
            min_order_size: Decimal::ZERO,
            prevent_self_trade: false,
        }
    }

    #[must_use]
    pub fn with_min_order_size(mut self, min: Decimal) -> Self {
        self.min_order_size = min;
        self
    }

    #[must_use]
    pub fn with_self_trade_prevention(mut self) -> Self {
        self.prevent_self_trade = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().is_empty() {
            return Err(OpenvenueError::Configuration("market id is empty".to_string()));
        }
        if self.outcomes.is_empty() {
            return Err(OpenvenueError::Configuration(format!(
                "market {} has no outcomes",
                self.id
            )));
        }
        let unique: HashSet<&OutcomeId> = self.outcomes.iter().collect();
        if unique.len() != self.outcomes.len() {
            return Err(OpenvenueError::Configuration(format!(
                "market {} has duplicate outcomes",
                self.id
            )));
        }
        if matches!(self.kind, MarketKind::Derivative { .. }) && self.outcomes.len() != 1 {
            return Err(OpenvenueError::Configuration(format!(
                "derivative market {} must have exactly one outcome",
                self.id
            )));
        }
        if self.kind.is_prediction() && self.outcomes.len() < 2 {
            return Err(OpenvenueError::Configuration(format!(
                "prediction market {} needs at least two outcomes",
                self.id
            )));
        }
        if self.min_order_size.is_sign_negative() {
            return Err(OpenvenueError::Configuration(format!(
                "market {} has negative min_order_size",
                self.id
            )));
        }
        Ok(())
    }
}

/// How `add_liquidity` treats deposits off the reserve ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum LiquidityRatioPolicy {
    /// Deposit only the matching portion of the larger side and refund the rest.
    #[default]
    CreditMatching,
    /// Reject deposits whose ratio differs from the reserve ratio by more
    /// than `tolerance` (relative).
    Strict { tolerance: Decimal },
}

/// Per-pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub id: PoolId,
    pub token_a: AssetId,
    pub token_b: AssetId,
    /// Fraction of each input kept by the pool, in `[0, 1)`.
    pub fee_rate: Decimal,
    #[serde(default)]
    pub ratio_policy: LiquidityRatioPolicy,
    /// Relative spot/reference deviation above which a rebalance is signalled.
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: Decimal,
    /// Decimal places kept on swap outputs and LP mints (truncated toward zero).
    #[serde(default = "default_amount_scale")]
    pub amount_scale: u32,
}

fn default_rebalance_threshold() -> Decimal {
    constants::DEFAULT_REBALANCE_THRESHOLD
}

fn default_amount_scale() -> u32 {
    constants::DEFAULT_AMOUNT_SCALE
}

impl PoolConfig {
    #[must_use]
    pub fn new(
        id: impl Into<PoolId>,
        token_a: impl Into<AssetId>,
        token_b: impl Into<AssetId>,
        fee_rate: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            token_a: token_a.into(),
            token_b: token_b.into(),
            fee_rate,
            ratio_policy: LiquidityRatioPolicy::default(),
            rebalance_threshold: constants::DEFAULT_REBALANCE_THRESHOLD,
            amount_scale: constants::DEFAULT_AMOUNT_SCALE,
        }
    }

    #[must_use]
    pub fn with_ratio_policy(mut self, policy: LiquidityRatioPolicy) -> Self {
        self.ratio_policy = policy;
        self
    }

    #[must_use]
    pub fn with_rebalance_threshold(mut self, threshold: Decimal) -> Self {
        self.rebalance_threshold = threshold;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.token_a == self.token_b {
            return Err(OpenvenueError::Configuration(format!(
                "pool {} trades {} against itself",
                self.id, self.token_a
            )));
        }
        if self.fee_rate.is_sign_negative() || self.fee_rate >= Decimal::ONE {
            return Err(OpenvenueError::Configuration(format!(
                "pool {} fee_rate {} outside [0, 1)",
                self.id, self.fee_rate
            )));
        }
        if self.rebalance_threshold.is_sign_negative() {
            return Err(OpenvenueError::Configuration(format!(
                "pool {} has negative rebalance_threshold",
                self.id
            )));
        }
        if let LiquidityRatioPolicy::Strict { tolerance } = self.ratio_policy {
            if tolerance.is_sign_negative() {
                return Err(OpenvenueError::Configuration(format!(
                    "pool {} has negative ratio tolerance",
                    self.id
                )));
            }
        }
        if self.amount_scale > constants::MAX_DECIMAL_SCALE {
            return Err(OpenvenueError::Configuration(format!(
                "pool {} amount_scale {} exceeds {}",
                self.id,
                self.amount_scale,
                constants::MAX_DECIMAL_SCALE
            )));
        }
        Ok(())
    }
}

/// Limits enforced by the default risk kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Largest single order quantity.
    pub max_order_size: Option<Decimal>,
    /// Largest single order price × quantity.
    pub max_notional: Option<Decimal>,
    /// Allowed relative distance from the reference price, e.g. `0.5` = ±50%.
    pub max_price_deviation: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_size: None,
            max_notional: None,
            max_price_deviation: constants::DEFAULT_MAX_PRICE_DEVIATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.queue_capacity, 1024);
        assert_eq!(cfg.backpressure, BackpressurePolicy::Reject);
        assert_eq!(cfg.default_order_ttl_secs, Some(86_400));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn engine_config_partial_json() {
        let cfg = EngineConfig::from_json_str(
            r#"{"queue_capacity": 8, "backpressure": {"policy": "block", "timeout_ms": 50}}"#,
        )
        .unwrap();
        assert_eq!(cfg.queue_capacity, 8);
        assert_eq!(cfg.backpressure, BackpressurePolicy::Block { timeout_ms: 50 });
        assert_eq!(cfg.sweep_interval_ms, constants::DEFAULT_SWEEP_INTERVAL_MS);
    }

    #[test]
    fn engine_config_rejects_zero_capacity() {
        let err = EngineConfig::from_json_str(r#"{"queue_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, OpenvenueError::Configuration(_)));
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, OpenvenueError::Serialization(_)));
    }

    #[test]
    fn binary_market() {
        let cfg = MarketConfig::binary("ELECTION", "Who wins?");
        assert_eq!(cfg.outcomes.len(), 2);
        assert!(cfg.kind.is_prediction());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn derivative_market_single_outcome() {
        let mut cfg = MarketConfig::derivative("BTC-PERP", "BTC perpetual", "BTC");
        assert!(cfg.validate().is_ok());
        cfg.outcomes.push(OutcomeId::new("OTHER"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn duplicate_outcomes_rejected() {
        let cfg = MarketConfig::prediction(
            "M",
            "m",
            vec![OutcomeId::new("A"), OutcomeId::new("A")],
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn pool_config_json_defaults() {
        let cfg = PoolConfig::from_json_str(
            r#"{"id": "ETH-USDC", "token_a": "ETH", "token_b": "USDC", "fee_rate": "0.003"}"#,
        )
        .unwrap();
        assert_eq!(cfg.fee_rate, Decimal::new(3, 3));
        assert_eq!(cfg.ratio_policy, LiquidityRatioPolicy::CreditMatching);
        assert_eq!(cfg.amount_scale, 18);
        assert_eq!(cfg.rebalance_threshold, Decimal::new(5, 2));
    }

    #[test]
    fn pool_config_validation() {
        assert!(PoolConfig::new("P", "A", "A", Decimal::ZERO).validate().is_err());
        assert!(PoolConfig::new("P", "A", "B", Decimal::ONE).validate().is_err());
        assert!(
            PoolConfig::new("P", "A", "B", Decimal::new(3, 3))
                .validate()
                .is_ok()
        );
    }
}
