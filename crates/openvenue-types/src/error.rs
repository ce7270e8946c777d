//! Error types for the OpenVenue core.
//!
//! All errors use the `OV_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Market errors
//! - 3xx: Liquidity pool errors
//! - 4xx: Ledger / arithmetic errors
//! - 5xx: Engine errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AssetId, MarketId, MarketStatus, OrderId, OrderStatus, OutcomeId, PoolId, UserId};

/// Central error enum for all OpenVenue operations.
#[derive(Debug, Error)]
pub enum OpenvenueError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The requested order is unknown to the engine.
    #[error("OV_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The request failed validation (bad quantity, bad price, etc.).
    #[error("OV_ERR_101: Validation failed: {reason}")]
    Validation { reason: String },

    /// An order with this ID already exists.
    #[error("OV_ERR_102: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The order is Filled, Cancelled, Rejected or Expired.
    #[error("OV_ERR_103: Order {order_id} is already terminal ({status})")]
    AlreadyTerminal {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// The requester does not own the order.
    #[error("OV_ERR_104: User {requester} is not the owner of order {order_id}")]
    Unauthorized {
        order_id: OrderId,
        requester: UserId,
    },

    /// The risk manager refused the order.
    #[error("OV_ERR_105: Risk limit exceeded: {reason}")]
    RiskLimitExceeded { reason: String },

    // =================================================================
    // Market Errors (2xx)
    // =================================================================
    #[error("OV_ERR_200: Market not found: {0}")]
    MarketNotFound(MarketId),

    /// The market is not in a status that allows the operation.
    #[error("OV_ERR_201: Market {market} is not active ({status})")]
    MarketNotActive {
        market: MarketId,
        status: MarketStatus,
    },

    #[error("OV_ERR_202: Market already resolved: {0}")]
    AlreadyResolved(MarketId),

    #[error("OV_ERR_203: Unknown outcome {outcome} for market {market}")]
    UnknownOutcome { market: MarketId, outcome: OutcomeId },

    /// Illegal lifecycle transition.
    #[error("OV_ERR_204: Market {market} cannot move from {from} to {to}")]
    InvalidTransition {
        market: MarketId,
        from: MarketStatus,
        to: MarketStatus,
    },

    #[error("OV_ERR_205: Market already exists: {0}")]
    DuplicateMarket(MarketId),

    // =================================================================
    // Liquidity Pool Errors (3xx)
    // =================================================================
    #[error("OV_ERR_300: Pool not found: {0}")]
    PoolNotFound(PoolId),

    /// The token is not one of the pool's two tokens.
    #[error("OV_ERR_301: Token {token} is not traded by pool {pool}")]
    InvalidToken { pool: PoolId, token: AssetId },

    #[error("OV_ERR_302: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("OV_ERR_303: Insufficient liquidity: {reason}")]
    InsufficientLiquidity { reason: String },

    #[error("OV_ERR_304: Insufficient LP balance: need {needed}, have {available}")]
    InsufficientLPBalance { needed: Decimal, available: Decimal },

    /// The computed output is below the caller's minimum.
    #[error("OV_ERR_305: Slippage exceeded: expected at least {expected_min}, got {actual}")]
    SlippageExceeded { expected_min: Decimal, actual: Decimal },

    /// Deposit ratio deviates from the reserve ratio beyond tolerance.
    #[error("OV_ERR_306: Ratio mismatch: pool ratio {expected}, deposit ratio {actual}")]
    RatioMismatch { expected: Decimal, actual: Decimal },

    #[error("OV_ERR_307: Pool is paused: {0}")]
    PoolPaused(PoolId),

    #[error("OV_ERR_308: Pool already exists: {0}")]
    DuplicatePool(PoolId),

    // =================================================================
    // Ledger / Arithmetic Errors (4xx)
    // =================================================================
    /// A checked decimal operation overflowed.
    #[error("OV_ERR_400: Arithmetic overflow in {op}")]
    ArithmeticOverflow { op: &'static str },

    /// Net positions or reserves broke a conservation invariant.
    #[error("OV_ERR_401: Conservation violation: {reason}")]
    ConservationViolation { reason: String },

    // =================================================================
    // Engine Errors (5xx)
    // =================================================================
    /// The shard's work queue is full.
    #[error("OV_ERR_500: Shard {shard} is busy ({depth} operations queued)")]
    Busy { shard: String, depth: usize },

    /// The price oracle could not produce a price.
    #[error("OV_ERR_501: Oracle error: {reason}")]
    Oracle { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    #[error("OV_ERR_900: Internal error: {0}")]
    Internal(String),

    #[error("OV_ERR_901: Serialization error: {0}")]
    Serialization(String),

    #[error("OV_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// How a caller should react to a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// The request itself was wrong; fix it and submit again.
    Resubmit,
    /// The target no longer accepts this request.
    DoNotResubmit,
    /// Transient contention; the same request may succeed later.
    RetryLater,
    /// A bug or broken invariant; needs operator attention.
    Investigate,
}

impl OpenvenueError {
    /// Classify the error for the caller.
    #[must_use]
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            Self::Validation { .. }
            | Self::DuplicateOrder(_)
            | Self::RiskLimitExceeded { .. }
            | Self::UnknownOutcome { .. }
            | Self::InvalidToken { .. }
            | Self::InvalidAmount { .. }
            | Self::InsufficientLiquidity { .. }
            | Self::InsufficientLPBalance { .. }
            | Self::SlippageExceeded { .. }
            | Self::RatioMismatch { .. } => ErrorDisposition::Resubmit,
            Self::OrderNotFound(_)
            | Self::AlreadyTerminal { .. }
            | Self::Unauthorized { .. }
            | Self::MarketNotFound(_)
            | Self::MarketNotActive { .. }
            | Self::AlreadyResolved(_)
            | Self::InvalidTransition { .. }
            | Self::DuplicateMarket(_)
            | Self::PoolNotFound(_)
            | Self::PoolPaused(_)
            | Self::DuplicatePool(_) => ErrorDisposition::DoNotResubmit,
            Self::Busy { .. } | Self::Oracle { .. } => ErrorDisposition::RetryLater,
            Self::ArithmeticOverflow { .. }
            | Self::ConservationViolation { .. }
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_) => ErrorDisposition::Investigate,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, OpenvenueError>;

impl From<serde_json::Error> for OpenvenueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = OpenvenueError::OrderNotFound(OrderId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("OV_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn slippage_display() {
        let err = OpenvenueError::SlippageExceeded {
            expected_min: Decimal::new(100, 0),
            actual: Decimal::new(95, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("OV_ERR_305"));
        assert!(msg.contains("100"));
        assert!(msg.contains("95"));
    }

    #[test]
    fn market_not_active_display() {
        let err = OpenvenueError::MarketNotActive {
            market: MarketId::new("ELECTION"),
            status: MarketStatus::Suspended,
        };
        let msg = format!("{err}");
        assert!(msg.contains("ELECTION"));
        assert!(msg.contains("SUSPENDED"));
    }

    #[test]
    fn dispositions() {
        assert_eq!(
            OpenvenueError::Validation { reason: "x".into() }.disposition(),
            ErrorDisposition::Resubmit
        );
        assert_eq!(
            OpenvenueError::AlreadyResolved(MarketId::new("M")).disposition(),
            ErrorDisposition::DoNotResubmit
        );
        assert_eq!(
            OpenvenueError::Busy {
                shard: "M".into(),
                depth: 4
            }
            .disposition(),
            ErrorDisposition::RetryLater
        );
        assert_eq!(
            OpenvenueError::ArithmeticOverflow { op: "swap" }.disposition(),
            ErrorDisposition::Investigate
        );
    }

    #[test]
    fn all_errors_have_ov_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(OpenvenueError::PoolPaused(PoolId::new("P"))),
            Box::new(OpenvenueError::ArithmeticOverflow { op: "mint" }),
            Box::new(OpenvenueError::Internal("test".into())),
            Box::new(OpenvenueError::RatioMismatch {
                expected: Decimal::ONE,
                actual: Decimal::TWO,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("OV_ERR_"),
                "Error missing OV_ERR_ prefix: {msg}"
            );
        }
    }
}
