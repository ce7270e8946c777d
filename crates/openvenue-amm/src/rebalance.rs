//! Rebalance signal: compares a pool's spot price to an external reference.

use openvenue_types::{OpenvenueError, RebalanceSignal, Result};
use rust_decimal::Decimal;

use crate::{LiquidityPool, math};

impl LiquidityPool {
    /// Compare spot (`reserve_b / reserve_a`) with `reference_price`.
    ///
    /// When the relative deviation exceeds the pool's threshold the signal
    /// carries the swap that would move spot onto the reference, ignoring
    /// fees. Read-only.
    pub fn check_rebalance(&self, reference_price: Decimal) -> Result<RebalanceSignal> {
        if reference_price <= Decimal::ZERO {
            return Err(OpenvenueError::Validation {
                reason: format!("reference price must be positive, got {reference_price}"),
            });
        }
        let (ra, rb) = self.reserves();
        if ra <= Decimal::ZERO || rb <= Decimal::ZERO {
            return Err(OpenvenueError::InsufficientLiquidity {
                reason: format!("pool {} has no reserves", self.id()),
            });
        }

        let spot = math::mul_div(rb, Decimal::ONE, ra, "spot price")?;
        let deviation = math::mul_div(
            (spot - reference_price).abs(),
            Decimal::ONE,
            reference_price,
            "price deviation",
        )?;

        if deviation <= self.config().rebalance_threshold {
            return Ok(RebalanceSignal::Balanced {
                spot,
                target: reference_price,
                deviation,
            });
        }

        // Hold k = ra × rb and solve for the reserves at the reference price.
        let scale = self.config().amount_scale;
        let target_a = math::target_reserve(ra, rb, Decimal::ONE, reference_price, scale)?;
        let (token_in, amount_in) = if target_a > ra {
            (self.config().token_a.clone(), math::round_up(target_a - ra, scale))
        } else {
            let target_b = math::target_reserve(ra, rb, reference_price, Decimal::ONE, scale)?;
            (self.config().token_b.clone(), math::round_up(target_b - rb, scale))
        };

        tracing::debug!(
            pool = %self.id(),
            spot = %spot,
            target = %reference_price,
            deviation = %deviation,
            "Pool needs rebalancing"
        );

        Ok(RebalanceSignal::RebalanceNeeded {
            spot,
            target: reference_price,
            deviation,
            token_in,
            amount_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use openvenue_types::{AssetId, PoolConfig, UserId};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn pool(a: &str, b: &str) -> LiquidityPool {
        let mut p = LiquidityPool::new(PoolConfig::new("P", "A", "B", Decimal::ZERO)).unwrap();
        p.add_liquidity(&UserId::new("lp"), dec(a), dec(b), Decimal::ZERO).unwrap();
        p
    }

    #[test]
    fn within_threshold_is_balanced() {
        let p = pool("1000", "2000");
        let signal = p.check_rebalance(dec("2.05")).unwrap();
        assert!(!signal.is_needed());
        assert!(matches!(signal, RebalanceSignal::Balanced { spot, .. } if spot == dec("2")));
    }

    #[test]
    fn cheap_token_b_needs_b_sold() {
        // spot 2 B/A, reference 4: A is underpriced in the pool, so buy A with B.
        let p = pool("1000", "2000");
        match p.check_rebalance(dec("4")).unwrap() {
            RebalanceSignal::RebalanceNeeded {
                token_in, amount_in, deviation, ..
            } => {
                assert_eq!(token_in, AssetId::new("B"));
                assert_eq!(deviation, dec("0.5"));
                // k = 2e6, rb' = sqrt(8e6) ≈ 2828.43
                assert!(amount_in > dec("828.42") && amount_in < dec("828.43"), "{amount_in}");
            }
            other => panic!("expected rebalance, got {other:?}"),
        }
    }

    #[test]
    fn expensive_spot_needs_a_sold() {
        let p = pool("1000", "4000");
        match p.check_rebalance(dec("1")).unwrap() {
            RebalanceSignal::RebalanceNeeded { token_in, amount_in, .. } => {
                assert_eq!(token_in, AssetId::new("A"));
                // ra' = sqrt(4e6) = 2000
                assert!((amount_in - dec("1000")).abs() < dec("0.000001"), "{amount_in}");
            }
            other => panic!("expected rebalance, got {other:?}"),
        }
    }

    #[test]
    fn wei_scale_pool_signals() {
        let p = pool("1000000000000000000", "1000000000000000000");
        match p.check_rebalance(dec("4")).unwrap() {
            RebalanceSignal::RebalanceNeeded { token_in, amount_in, .. } => {
                // rb' = sqrt(1e36 · 4) = 2e18
                assert_eq!(token_in, AssetId::new("B"));
                assert_eq!(amount_in, dec("1000000000000000000"));
            }
            other => panic!("expected rebalance, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_inputs() {
        let p = pool("1000", "2000");
        assert!(matches!(
            p.check_rebalance(Decimal::ZERO),
            Err(OpenvenueError::Validation { .. })
        ));
        let empty = LiquidityPool::new(PoolConfig::new("E", "A", "B", Decimal::ZERO)).unwrap();
        assert!(matches!(
            empty.check_rebalance(Decimal::ONE),
            Err(OpenvenueError::InsufficientLiquidity { .. })
        ));
    }
}
