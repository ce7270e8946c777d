//! # openvenue-matchcore
//!
//! **Continuous double-auction matching for OpenVenue.**
//!
//! One [`OrderBook`] per instrument, matched with price-time priority at the
//! resting order's price. The crate has:
//!
//! - **No I/O and no locking**: callers own the book exclusively
//! - **Two-phase matching**: [`plan_match`] is read-only, [`execute_plan`] commits
//! - **Deterministic output**: same inputs give the same trades and trade ids
//! - **Optional self-trade prevention** per market

pub mod determinism;
pub mod matcher;
pub mod orderbook;
pub mod price_level;

pub use determinism::{book_digest, compute_trade_root, verify_trade_root};
pub use matcher::{MatchOutcome, MatchPlan, PlannedFill, execute_plan, match_order, plan_match};
pub use orderbook::{BookSnapshot, OrderBook};
pub use price_level::PriceLevel;
