//! Capability traits for the engine's external collaborators.
//!
//! All three are called synchronously from inside a shard's serialized path
//! and must not call back into the engine.

use std::collections::HashMap;

use openvenue_types::{AssetId, AuditEvent, OpenvenueError, Order, Result};
use parking_lot::RwLock;
use rust_decimal::Decimal;

/// Pre-trade risk gate, consulted before an order is matched.
pub trait RiskManager: Send + Sync {
    /// # Errors
    /// `RiskLimitExceeded` (or any other error) rejects the order untouched.
    fn check_limits(&self, order: &Order) -> Result<()>;
}

/// Source of reference prices, used to settle derivative markets and to
/// check pools for rebalancing.
pub trait PriceOracle: Send + Sync {
    fn get_price(&self, asset: &AssetId) -> Result<Decimal>;
}

/// Receiver of audit events. Fire-and-forget: must not block or fail.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Accepts every order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveRisk;

impl RiskManager for PermissiveRisk {
    fn check_limits(&self, _order: &Order) -> Result<()> {
        Ok(())
    }
}

/// In-memory oracle with settable prices.
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    prices: RwLock<HashMap<AssetId, Decimal>>,
}

impl StaticPriceOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_price(self, asset: impl Into<AssetId>, price: Decimal) -> Self {
        self.set_price(asset, price);
        self
    }

    pub fn set_price(&self, asset: impl Into<AssetId>, price: Decimal) {
        self.prices.write().insert(asset.into(), price);
    }
}

impl PriceOracle for StaticPriceOracle {
    fn get_price(&self, asset: &AssetId) -> Result<Decimal> {
        let price = self
            .prices
            .read()
            .get(asset)
            .copied()
            .ok_or_else(|| OpenvenueError::Oracle {
                reason: format!("no price for {asset}"),
            })?;
        if price <= Decimal::ZERO {
            return Err(OpenvenueError::Oracle {
                reason: format!("non-positive price {price} for {asset}"),
            });
        }
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_oracle_prices() {
        let oracle = StaticPriceOracle::new().with_price("BTC", Decimal::new(50_000, 0));
        assert_eq!(oracle.get_price(&AssetId::new("BTC")).unwrap(), Decimal::new(50_000, 0));
        assert!(matches!(
            oracle.get_price(&AssetId::new("ETH")),
            Err(OpenvenueError::Oracle { .. })
        ));
        oracle.set_price("ETH", Decimal::ZERO);
        assert!(oracle.get_price(&AssetId::new("ETH")).is_err());
    }
}
