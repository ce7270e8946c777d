//! Risk kernel: the default pre-trade gate.
//!
//! Checks, in order:
//! 1. order size against `max_order_size`
//! 2. price × quantity against `max_notional`
//! 3. distance from the instrument's reference price, if one is set

use std::collections::HashMap;

use openvenue_types::{Instrument, OpenvenueError, Order, Result, RiskConfig};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::collaborators::RiskManager;

/// Limits from a [`RiskConfig`] plus per-instrument reference prices.
pub struct RiskKernel {
    limits: RiskConfig,
    reference_prices: RwLock<HashMap<Instrument, Decimal>>,
}

impl RiskKernel {
    /// Kernel with default limits (deviation band only).
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(RiskConfig::default())
    }

    #[must_use]
    pub fn with_limits(limits: RiskConfig) -> Self {
        Self {
            limits,
            reference_prices: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn limits(&self) -> &RiskConfig {
        &self.limits
    }

    /// Update the reference price for an instrument.
    pub fn set_reference_price(&self, instrument: Instrument, price: Decimal) {
        self.reference_prices.write().insert(instrument, price);
    }

    #[must_use]
    pub fn reference_price(&self, instrument: &Instrument) -> Option<Decimal> {
        self.reference_prices.read().get(instrument).copied()
    }

    /// Reject prices more than `max_price_deviation` (relative) away from
    /// the reference.
    fn check_price_deviation(&self, instrument: &Instrument, price: Decimal) -> Result<()> {
        let Some(reference) = self.reference_price(instrument) else {
            return Ok(());
        };
        if reference.is_zero() {
            return Ok(());
        }
        // Too far off to represent is past any band.
        let Some(deviation) = price
            .checked_sub(reference)
            .and_then(|diff| diff.checked_div(reference))
            .map(|d| d.abs())
        else {
            return Err(OpenvenueError::RiskLimitExceeded {
                reason: format!("Price {price} is out of range of reference {reference}"),
            });
        };
        if deviation > self.limits.max_price_deviation {
            return Err(OpenvenueError::RiskLimitExceeded {
                reason: format!(
                    "Price {price} deviates {deviation} from reference {reference} \
                     (max {max})",
                    max = self.limits.max_price_deviation,
                ),
            });
        }
        Ok(())
    }
}

impl Default for RiskKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskManager for RiskKernel {
    fn check_limits(&self, order: &Order) -> Result<()> {
        if let Some(max) = self.limits.max_order_size {
            if order.quantity > max {
                return Err(OpenvenueError::RiskLimitExceeded {
                    reason: format!("Order size {} exceeds maximum {max}", order.quantity),
                });
            }
        }

        if let Some(max) = self.limits.max_notional {
            let notional = order
                .price
                .checked_mul(order.quantity)
                .ok_or(OpenvenueError::ArithmeticOverflow { op: "order notional" })?;
            if notional > max {
                return Err(OpenvenueError::RiskLimitExceeded {
                    reason: format!("Order notional {notional} exceeds maximum {max}"),
                });
            }
        }

        self.check_price_deviation(&order.instrument(), order.price)
    }
}
