//! A two-token constant-product liquidity pool.
//!
//! Invariants held after every committed operation:
//! - `reserve_a × reserve_b` never decreases across a swap (strictly
//!   increases when `fee_rate > 0`)
//! - LP supply grows only through `add_liquidity` and shrinks only through
//!   `remove_liquidity`
//! - the sum of provider balances equals the LP supply
//!
//! Every method validates and computes first, then commits all fields
//! together, so a failed call leaves the pool untouched.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use openvenue_types::{
    AssetId, LiquidityRatioPolicy, LiquidityReceipt, OpenvenueError, PoolConfig, PoolId,
    PoolSnapshot, PoolStats, RemovalReceipt, Result, SwapReceipt, UserId,
};
use rust_decimal::Decimal;

use crate::math;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

#[derive(Debug, Clone)]
pub struct LiquidityPool {
    config: PoolConfig,
    reserve_a: Decimal,
    reserve_b: Decimal,
    total_lp_supply: Decimal,
    lp_balances: BTreeMap<UserId, Decimal>,
    paused: bool,
    stats: PoolStats,
}

impl LiquidityPool {
    /// Create an empty pool.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reserve_a: Decimal::ZERO,
            reserve_b: Decimal::ZERO,
            total_lp_supply: Decimal::ZERO,
            lp_balances: BTreeMap::new(),
            paused: false,
            stats: PoolStats::default(),
        })
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn id(&self) -> &PoolId {
        &self.config.id
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[must_use]
    pub fn reserves(&self) -> (Decimal, Decimal) {
        (self.reserve_a, self.reserve_b)
    }

    #[must_use]
    pub fn total_lp_supply(&self) -> Decimal {
        self.total_lp_supply
    }

    #[must_use]
    pub fn lp_balance(&self, provider: &UserId) -> Decimal {
        self.lp_balances.get(provider).copied().unwrap_or(Decimal::ZERO)
    }

    /// Provider balances in provider order.
    pub fn lp_balances(&self) -> impl Iterator<Item = (&UserId, &Decimal)> {
        self.lp_balances.iter()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Current `reserve_a × reserve_b`, exact, in 10^-56 units.
    #[must_use]
    pub fn invariant(&self) -> BigInt {
        math::exact_product(self.reserve_a, self.reserve_b)
    }

    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            id: self.config.id.clone(),
            token_a: self.config.token_a.clone(),
            token_b: self.config.token_b.clone(),
            reserve_a: self.reserve_a,
            reserve_b: self.reserve_b,
            total_lp_supply: self.total_lp_supply,
            fee_rate: self.config.fee_rate,
            paused: self.paused,
            stats: self.stats.clone(),
        }
    }

    fn side_of(&self, token: &AssetId) -> Result<Side> {
        if *token == self.config.token_a {
            Ok(Side::A)
        } else if *token == self.config.token_b {
            Ok(Side::B)
        } else {
            Err(OpenvenueError::InvalidToken {
                pool: self.config.id.clone(),
                token: token.clone(),
            })
        }
    }

    fn ensure_named(user: &UserId, role: &str) -> Result<()> {
        if user.as_str().is_empty() {
            return Err(OpenvenueError::Validation {
                reason: format!("{role} id must not be empty"),
            });
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.paused {
            return Err(OpenvenueError::PoolPaused(self.config.id.clone()));
        }
        Ok(())
    }

    // =================================================================
    // Swaps
    // =================================================================

    /// Output for swapping `amount_in` of `token_in`. Pure.
    pub fn quote(&self, token_in: &AssetId, amount_in: Decimal) -> Result<Decimal> {
        if amount_in <= Decimal::ZERO {
            return Err(OpenvenueError::InvalidAmount {
                reason: format!("swap input must be positive, got {amount_in}"),
            });
        }
        let (reserve_in, reserve_out) = match self.side_of(token_in)? {
            Side::A => (self.reserve_a, self.reserve_b),
            Side::B => (self.reserve_b, self.reserve_a),
        };
        math::amount_out(
            reserve_in,
            reserve_out,
            amount_in,
            self.config.fee_rate,
            self.config.amount_scale,
        )
    }

    /// Swap `amount_in` of `token_in` for the other token.
    ///
    /// # Errors
    /// `InvalidAmount`, `InvalidToken`, `PoolPaused`, `InsufficientLiquidity`,
    /// `SlippageExceeded` when the output is below `min_amount_out`,
    /// `Validation` for an empty trader id, or `ArithmeticOverflow`.
    pub fn swap(
        &mut self,
        trader: &UserId,
        token_in: &AssetId,
        amount_in: Decimal,
        min_amount_out: Decimal,
    ) -> Result<SwapReceipt> {
        Self::ensure_named(trader, "trader")?;
        let side = self.side_of(token_in)?;
        self.ensure_live()?;
        let amount_out = self.quote(token_in, amount_in)?;
        if amount_out <= Decimal::ZERO {
            return Err(OpenvenueError::InvalidAmount {
                reason: format!("swap of {amount_in} {token_in} yields nothing"),
            });
        }
        if amount_out < min_amount_out {
            return Err(OpenvenueError::SlippageExceeded {
                expected_min: min_amount_out,
                actual: amount_out,
            });
        }

        let overflow = || OpenvenueError::ArithmeticOverflow { op: "swap reserves" };
        let (new_a, new_b, token_out) = match side {
            Side::A => (
                self.reserve_a.checked_add(amount_in).ok_or_else(overflow)?,
                self.reserve_b - amount_out,
                self.config.token_b.clone(),
            ),
            Side::B => (
                self.reserve_a - amount_out,
                self.reserve_b.checked_add(amount_in).ok_or_else(overflow)?,
                self.config.token_a.clone(),
            ),
        };

        if math::exact_product(new_a, new_b) < self.invariant() {
            return Err(OpenvenueError::ConservationViolation {
                reason: format!(
                    "pool {} product would fall: reserves {}/{} -> {new_a}/{new_b}",
                    self.config.id, self.reserve_a, self.reserve_b
                ),
            });
        }

        let fee = amount_in - math::effective_input(amount_in, self.config.fee_rate)?;

        // Commit.
        self.reserve_a = new_a;
        self.reserve_b = new_b;
        self.stats.swap_count += 1;
        match side {
            Side::A => {
                self.stats.volume_a += amount_in;
                self.stats.fees_a += fee;
            }
            Side::B => {
                self.stats.volume_b += amount_in;
                self.stats.fees_b += fee;
            }
        }

        tracing::debug!(
            pool = %self.config.id,
            token_in = %token_in,
            amount_in = %amount_in,
            amount_out = %amount_out,
            "Swap executed"
        );

        Ok(SwapReceipt {
            pool: self.config.id.clone(),
            trader: trader.clone(),
            token_in: token_in.clone(),
            token_out,
            amount_in,
            amount_out,
            fee,
            reserve_a: self.reserve_a,
            reserve_b: self.reserve_b,
        })
    }

    // =================================================================
    // Liquidity
    // =================================================================

    /// Deposit both tokens and mint LP tokens to `provider`.
    ///
    /// The first deposit into an empty pool mints `sqrt(a × b)` and sets the
    /// price. Later deposits mint `min(a / reserve_a, b / reserve_b) × supply`;
    /// what happens to the off-ratio surplus depends on the pool's
    /// [`LiquidityRatioPolicy`].
    pub fn add_liquidity(
        &mut self,
        provider: &UserId,
        amount_a: Decimal,
        amount_b: Decimal,
        min_lp_out: Decimal,
    ) -> Result<LiquidityReceipt> {
        Self::ensure_named(provider, "provider")?;
        if amount_a <= Decimal::ZERO || amount_b <= Decimal::ZERO {
            return Err(OpenvenueError::InvalidAmount {
                reason: format!("liquidity amounts must be positive, got {amount_a} / {amount_b}"),
            });
        }
        self.ensure_live()?;
        let scale = self.config.amount_scale;

        let (lp, used_a, used_b) = if self.total_lp_supply.is_zero() {
            (math::geometric_mean(amount_a, amount_b, scale)?, amount_a, amount_b)
        } else {
            self.matched_deposit(amount_a, amount_b)?
        };

        if lp <= Decimal::ZERO {
            return Err(OpenvenueError::InvalidAmount {
                reason: "deposit too small to mint LP tokens".to_string(),
            });
        }
        if lp < min_lp_out {
            return Err(OpenvenueError::SlippageExceeded {
                expected_min: min_lp_out,
                actual: lp,
            });
        }

        let overflow = || OpenvenueError::ArithmeticOverflow { op: "add liquidity" };
        let new_a = self.reserve_a.checked_add(used_a).ok_or_else(overflow)?;
        let new_b = self.reserve_b.checked_add(used_b).ok_or_else(overflow)?;
        let new_supply = self.total_lp_supply.checked_add(lp).ok_or_else(overflow)?;

        // Commit.
        self.reserve_a = new_a;
        self.reserve_b = new_b;
        self.total_lp_supply = new_supply;
        *self
            .lp_balances
            .entry(provider.clone())
            .or_insert(Decimal::ZERO) += lp;

        tracing::debug!(
            pool = %self.config.id,
            provider = %provider,
            lp_minted = %lp,
            "Liquidity added"
        );

        Ok(LiquidityReceipt {
            pool: self.config.id.clone(),
            provider: provider.clone(),
            lp_minted: lp,
            amount_a: used_a,
            amount_b: used_b,
            refund_a: amount_a - used_a,
            refund_b: amount_b - used_b,
        })
    }

    /// LP minted and amounts taken for a deposit into a funded pool.
    fn matched_deposit(
        &self,
        amount_a: Decimal,
        amount_b: Decimal,
    ) -> Result<(Decimal, Decimal, Decimal)> {
        let scale = self.config.amount_scale;
        let (ra, rb, supply) = (self.reserve_a, self.reserve_b, self.total_lp_supply);
        if ra <= Decimal::ZERO || rb <= Decimal::ZERO {
            return Err(OpenvenueError::InsufficientLiquidity {
                reason: "pool has LP supply but no reserves".to_string(),
            });
        }
        let lp = math::proportional_mint(amount_a, amount_b, ra, rb, supply, scale)?;

        match self.config.ratio_policy {
            LiquidityRatioPolicy::Strict { tolerance } => {
                let pool_ratio = math::mul_div(rb, Decimal::ONE, ra, "pool ratio")?;
                let deposit_ratio = math::mul_div(amount_b, Decimal::ONE, amount_a, "deposit ratio")?;
                let deviation = math::mul_div(
                    (deposit_ratio - pool_ratio).abs(),
                    Decimal::ONE,
                    pool_ratio,
                    "ratio deviation",
                )?;
                if deviation > tolerance {
                    return Err(OpenvenueError::RatioMismatch {
                        expected: pool_ratio,
                        actual: deposit_ratio,
                    });
                }
                Ok((lp, amount_a, amount_b))
            }
            LiquidityRatioPolicy::CreditMatching => {
                // a × rb <= b × ra  means token A is the limiting side.
                let a_limits = math::exact_product(amount_a, rb) <= math::exact_product(amount_b, ra);
                if a_limits {
                    let needed_b = math::mul_div_up(amount_a, rb, ra, scale, "matched b")?;
                    Ok((lp, amount_a, needed_b.min(amount_b)))
                } else {
                    let needed_a = math::mul_div_up(amount_b, ra, rb, scale, "matched a")?;
                    Ok((lp, needed_a.min(amount_a), amount_b))
                }
            }
        }
    }

    /// Burn `lp_tokens` of `provider` and pay out the pro-rata reserves.
    pub fn remove_liquidity(
        &mut self,
        provider: &UserId,
        lp_tokens: Decimal,
        min_amount_a: Decimal,
        min_amount_b: Decimal,
    ) -> Result<RemovalReceipt> {
        Self::ensure_named(provider, "provider")?;
        if lp_tokens <= Decimal::ZERO {
            return Err(OpenvenueError::InvalidAmount {
                reason: format!("LP amount must be positive, got {lp_tokens}"),
            });
        }
        self.ensure_live()?;
        let held = self.lp_balance(provider);
        if held < lp_tokens {
            return Err(OpenvenueError::InsufficientLPBalance {
                needed: lp_tokens,
                available: held,
            });
        }

        let scale = self.config.amount_scale;
        let amount_a = math::pro_rata(lp_tokens, self.total_lp_supply, self.reserve_a, scale)?;
        let amount_b = math::pro_rata(lp_tokens, self.total_lp_supply, self.reserve_b, scale)?;
        if amount_a < min_amount_a {
            return Err(OpenvenueError::SlippageExceeded {
                expected_min: min_amount_a,
                actual: amount_a,
            });
        }
        if amount_b < min_amount_b {
            return Err(OpenvenueError::SlippageExceeded {
                expected_min: min_amount_b,
                actual: amount_b,
            });
        }

        // Commit.
        self.reserve_a -= amount_a;
        self.reserve_b -= amount_b;
        self.total_lp_supply -= lp_tokens;
        let remaining = held - lp_tokens;
        if remaining.is_zero() {
            self.lp_balances.remove(provider);
        } else {
            self.lp_balances.insert(provider.clone(), remaining);
        }

        tracing::debug!(
            pool = %self.config.id,
            provider = %provider,
            lp_burned = %lp_tokens,
            "Liquidity removed"
        );

        Ok(RemovalReceipt {
            pool: self.config.id.clone(),
            provider: provider.clone(),
            lp_burned: lp_tokens,
            amount_a,
            amount_b,
        })
    }

    // =================================================================
    // Administration
    // =================================================================

    /// Stop swaps and liquidity changes.
    pub fn pause(&mut self) -> Result<()> {
        if self.paused {
            return Err(OpenvenueError::Validation {
                reason: format!("pool {} is already paused", self.config.id),
            });
        }
        self.paused = true;
        Ok(())
    }

    pub fn unpause(&mut self) -> Result<()> {
        if !self.paused {
            return Err(OpenvenueError::Validation {
                reason: format!("pool {} is not paused", self.config.id),
            });
        }
        self.paused = false;
        Ok(())
    }
}
