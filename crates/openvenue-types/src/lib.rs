//! # openvenue-types
//!
//! Shared types, errors, and configuration for the **OpenVenue** core.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`TradeId`], [`UserId`], [`MarketId`], [`OutcomeId`], [`PoolId`], [`AssetId`], [`Instrument`]
//! - **Order model**: [`Order`], [`OrderRequest`], [`OrderSide`], [`OrderStatus`]
//! - **Trade model**: [`Trade`]
//! - **Positions**: [`Position`]
//! - **Markets**: [`MarketKind`], [`MarketStatus`], [`MarketInfo`], [`Resolution`]
//! - **Pools**: [`PoolSnapshot`], [`SwapReceipt`], [`LiquidityReceipt`], [`RebalanceSignal`]
//! - **Audit**: [`AuditEvent`]
//! - **Configuration**: [`EngineConfig`], [`MarketConfig`], [`PoolConfig`], [`RiskConfig`]
//! - **Errors**: [`OpenvenueError`] with `OV_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod audit;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod market;
pub mod order;
pub mod pool;
pub mod position;
pub mod trade;

pub use audit::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use market::*;
pub use order::*;
pub use pool::*;
pub use position::*;
pub use trade::*;

// Constants are accessed via `openvenue_types::constants::FOO`
// (not re-exported to avoid name collisions).
