//! Constant-product pool math.
//!
//! ```text
//! amount_in_eff = amount_in × (1 − fee)
//! amount_out    = reserve_out × amount_in_eff / (reserve_in + amount_in_eff)
//! ```
//!
//! Pools at base-unit scale (1e18 wei against 1e18 wei) have reserve products
//! far past what a `Decimal` holds, so products, quotients and roots are formed
//! exactly on [`BigInt`] and only the result is brought back to a `Decimal`.
//! A result too wide for the requested scale keeps as many places as fit; one
//! that fits at no scale is an `ArithmeticOverflow`. Outputs paid by the pool
//! are truncated toward zero and inputs owed to the pool are rounded away from
//! zero.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};
use openvenue_types::constants::MAX_DECIMAL_SCALE;
use openvenue_types::{OpenvenueError, Result};
use rust_decimal::{Decimal, RoundingStrategy};

/// Every decimal is widened to an integer count of 10^-28 units.
const WIDE: u32 = MAX_DECIMAL_SCALE;

fn overflow(op: &'static str) -> OpenvenueError {
    OpenvenueError::ArithmeticOverflow { op }
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10_u8).pow(exp)
}

fn widen(value: Decimal) -> BigInt {
    BigInt::from(value.mantissa()) * pow10(WIDE - value.scale())
}

/// The widest decimal of at most `scale` places whose mantissa
/// `units_at(places)` returns.
fn fit(scale: u32, op: &'static str, units_at: impl Fn(u32) -> BigInt) -> Result<Decimal> {
    let mut places = scale.min(WIDE);
    loop {
        let units = units_at(places);
        if let Some(value) = units
            .to_i128()
            .and_then(|m| Decimal::try_from_i128_with_scale(m, places).ok())
        {
            return Ok(value);
        }
        if places == 0 {
            return Err(overflow(op));
        }
        places -= 1;
    }
}

/// `num / den` at `scale` places. `den` must be positive.
fn quotient(num: &BigInt, den: &BigInt, scale: u32, up: bool, op: &'static str) -> Result<Decimal> {
    if !den.is_positive() {
        return Err(overflow(op));
    }
    fit(scale, op, |places| {
        let scaled = num * pow10(places);
        let q = &scaled / den;
        if up && &q * den != scaled { q + 1_u32 } else { q }
    })
}

/// `sqrt(num / den)` at `scale` places.
fn root(num: &BigInt, den: &BigInt, scale: u32, up: bool, op: &'static str) -> Result<Decimal> {
    if !den.is_positive() {
        return Err(overflow(op));
    }
    if num.is_negative() {
        return Err(OpenvenueError::InvalidAmount {
            reason: format!("{op}: square root of a negative value"),
        });
    }
    fit(scale, op, |places| {
        let scaled = num * pow10(2 * places);
        let r = (&scaled / den).sqrt();
        if up && &r * &r * den != scaled { r + 1_u32 } else { r }
    })
}

/// Truncate toward zero at `scale` decimal places.
#[must_use]
pub fn truncate(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::ToZero)
}

/// Round away from zero at `scale` decimal places.
#[must_use]
pub fn round_up(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::AwayFromZero)
}

/// Exact `a × b`, as an integer count of 10^-56 units.
#[must_use]
pub fn exact_product(a: Decimal, b: Decimal) -> BigInt {
    widen(a) * widen(b)
}

/// Input after the fee is withheld.
pub fn effective_input(amount_in: Decimal, fee_rate: Decimal) -> Result<Decimal> {
    amount_in
        .checked_mul(Decimal::ONE - fee_rate)
        .ok_or_else(|| overflow("fee"))
}

/// Output of a swap of `amount_in` against the given reserves, truncated at
/// `scale`.
///
/// The quotient is exact before truncation, so the post-swap product is
/// never below the pre-swap product.
pub fn amount_out(
    reserve_in: Decimal,
    reserve_out: Decimal,
    amount_in: Decimal,
    fee_rate: Decimal,
    scale: u32,
) -> Result<Decimal> {
    if reserve_in <= Decimal::ZERO || reserve_out <= Decimal::ZERO {
        return Err(OpenvenueError::InsufficientLiquidity {
            reason: "pool has no reserves".to_string(),
        });
    }
    // 10^-56 units
    let in_eff = widen(amount_in) * widen(Decimal::ONE - fee_rate);
    let numerator = widen(reserve_out) * &in_eff;
    let denominator = (widen(reserve_in) * pow10(WIDE) + in_eff) * pow10(WIDE);
    Ok(quotient(&numerator, &denominator, scale, false, "swap output")?.max(Decimal::ZERO))
}

/// LP tokens for the first deposit: `sqrt(amount_a × amount_b)`, truncated.
pub fn geometric_mean(amount_a: Decimal, amount_b: Decimal, scale: u32) -> Result<Decimal> {
    root(
        &exact_product(amount_a, amount_b),
        &pow10(2 * WIDE),
        scale,
        false,
        "initial liquidity",
    )
}

/// `amount × numerator / denominator`, exact up to the last of 28 places.
pub fn mul_div(
    amount: Decimal,
    numerator: Decimal,
    denominator: Decimal,
    op: &'static str,
) -> Result<Decimal> {
    quotient(
        &exact_product(amount, numerator),
        &(widen(denominator) * pow10(WIDE)),
        WIDE,
        false,
        op,
    )
}

/// `amount × numerator / denominator`, rounded up at `scale`.
pub fn mul_div_up(
    amount: Decimal,
    numerator: Decimal,
    denominator: Decimal,
    scale: u32,
    op: &'static str,
) -> Result<Decimal> {
    quotient(
        &exact_product(amount, numerator),
        &(widen(denominator) * pow10(WIDE)),
        scale,
        true,
        op,
    )
}

/// `sqrt(reserve_a × reserve_b × numerator / denominator)`, rounded up.
///
/// With `numerator / denominator` a price this is the reserve that puts
/// the pool on that price while holding its product.
pub fn target_reserve(
    reserve_a: Decimal,
    reserve_b: Decimal,
    numerator: Decimal,
    denominator: Decimal,
    scale: u32,
) -> Result<Decimal> {
    root(
        &(exact_product(reserve_a, reserve_b) * widen(numerator)),
        &(widen(denominator) * pow10(2 * WIDE)),
        scale,
        true,
        "rebalance target",
    )
}

/// LP tokens for a deposit into a funded pool:
/// `min(a / reserve_a, b / reserve_b) × supply`, truncated.
pub fn proportional_mint(
    amount_a: Decimal,
    amount_b: Decimal,
    reserve_a: Decimal,
    reserve_b: Decimal,
    supply: Decimal,
    scale: u32,
) -> Result<Decimal> {
    let via_a = mul_div(amount_a, supply, reserve_a, "mint via token a")?;
    let via_b = mul_div(amount_b, supply, reserve_b, "mint via token b")?;
    Ok(truncate(via_a.min(via_b), scale))
}

/// Share of `reserve` owed for burning `lp_tokens` out of `supply`, truncated.
pub fn pro_rata(lp_tokens: Decimal, supply: Decimal, reserve: Decimal, scale: u32) -> Result<Decimal> {
    if supply <= Decimal::ZERO {
        return Err(OpenvenueError::InsufficientLiquidity {
            reason: "pool has no LP supply".to_string(),
        });
    }
    if lp_tokens == supply {
        return Ok(reserve);
    }
    Ok(truncate(mul_div(reserve, lp_tokens, supply, "burn")?, scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn quote_matches_reference_example() {
        // reserves 1000 / 2000, fee 0.3%, 100 in
        let out = amount_out(dec("1000"), dec("2000"), dec("100"), dec("0.003"), 18).unwrap();
        assert!(out > dec("181.32") && out < dec("181.33"), "got {out}");
    }

    #[test]
    fn zero_fee_exact() {
        let out = amount_out(dec("1000"), dec("1000"), dec("1000"), Decimal::ZERO, 18).unwrap();
        assert_eq!(out, dec("500"));
    }

    #[test]
    fn output_never_breaks_product() {
        let (ri, ro) = (dec("3"), dec("7"));
        let out = amount_out(ri, ro, dec("1"), Decimal::ZERO, 18).unwrap();
        let before = ri * ro;
        let after = (ri + dec("1")) * (ro - out);
        assert!(after >= before, "{after} < {before}");
    }

    #[test]
    fn truncation_favours_pool() {
        let out = amount_out(dec("3"), dec("10"), dec("1"), Decimal::ZERO, 2).unwrap();
        // exact 2.5
        assert_eq!(out, dec("2.50"));
        let out = amount_out(dec("3"), dec("7"), dec("1"), Decimal::ZERO, 2).unwrap();
        // exact 1.75
        assert_eq!(out, dec("1.75"));
        let out = amount_out(dec("6"), dec("7"), dec("1"), Decimal::ZERO, 2).unwrap();
        // exact 1
        assert_eq!(out, dec("1.00"));
        let out = amount_out(dec("2"), dec("1"), dec("1"), Decimal::ZERO, 2).unwrap();
        // 0.333.. truncated
        assert_eq!(out, dec("0.33"));
    }

    #[test]
    fn empty_reserves_rejected() {
        let err = amount_out(Decimal::ZERO, dec("1"), dec("1"), Decimal::ZERO, 18).unwrap_err();
        assert!(matches!(err, OpenvenueError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn unrepresentable_results_are_reported() {
        let err = mul_div(Decimal::MAX, Decimal::MAX, Decimal::ONE, "square").unwrap_err();
        assert!(matches!(err, OpenvenueError::ArithmeticOverflow { op: "square" }));
        let err = mul_div(Decimal::ONE, Decimal::ONE, Decimal::ZERO, "by zero").unwrap_err();
        assert!(matches!(err, OpenvenueError::ArithmeticOverflow { .. }));
        // sqrt(MAX²) is MAX again
        assert_eq!(geometric_mean(Decimal::MAX, Decimal::MAX, 18).unwrap(), Decimal::MAX);
    }

    #[test]
    fn wei_scale_reserves() {
        let wei = dec("1000000000000000000");
        let usdc = dec("100000000000");

        // sqrt(1e29) keeps the places that fit
        let lp = geometric_mean(wei, usdc, 18).unwrap();
        assert!(lp > dec("316227766016837.9331") && lp < dec("316227766016837.9332"), "{lp}");
        assert_eq!(geometric_mean(wei, wei, 18).unwrap(), wei);

        assert_eq!(
            amount_out(wei, wei, wei, Decimal::ZERO, 18).unwrap(),
            dec("500000000000000000")
        );
        let amount = dec("10000000000000000");
        let out = amount_out(wei, usdc, amount, dec("0.003"), 18).unwrap();
        assert!(out > dec("987150") && out < dec("987160"), "{out}");
        assert!(exact_product(wei + amount, usdc - out) > exact_product(wei, usdc));
    }

    #[test]
    fn rounding_direction_of_mul_div() {
        let third = mul_div(dec("1"), dec("1"), dec("3"), "third").unwrap();
        assert_eq!(third, dec("0.3333333333333333333333333333"));
        assert_eq!(mul_div_up(dec("1"), dec("1"), dec("3"), 2, "third").unwrap(), dec("0.34"));
        assert_eq!(mul_div_up(dec("1"), dec("3"), dec("3"), 2, "one").unwrap(), dec("1"));
    }

    #[test]
    fn target_reserve_rounds_up() {
        // sqrt(1000 · 4000 / 1) = 2000 exactly
        let exact = target_reserve(dec("1000"), dec("4000"), Decimal::ONE, Decimal::ONE, 18);
        assert_eq!(exact.unwrap(), dec("2000"));
        // sqrt(2) = 1.41421356237309504880168872...
        let up = target_reserve(Decimal::ONE, dec("2"), Decimal::ONE, Decimal::ONE, 4);
        assert_eq!(up.unwrap(), dec("1.4143"));
    }

    #[test]
    fn geometric_mean_of_squares() {
        assert_eq!(geometric_mean(dec("1000"), dec("1000"), 18).unwrap(), dec("1000"));
        assert_eq!(geometric_mean(dec("4"), dec("9"), 18).unwrap(), dec("6"));
    }

    #[test]
    fn proportional_mint_takes_min_share() {
        let lp = proportional_mint(dec("100"), dec("300"), dec("1000"), dec("2000"), dec("1000"), 18)
            .unwrap();
        assert_eq!(lp, dec("100"));
    }

    #[test]
    fn pro_rata_full_burn_returns_everything() {
        assert_eq!(pro_rata(dec("10"), dec("10"), dec("3.3"), 1).unwrap(), dec("3.3"));
        assert_eq!(pro_rata(dec("1"), dec("3"), dec("10"), 2).unwrap(), dec("3.33"));
    }
}
