//! # openvenue-engine
//!
//! The concurrent trading venue: markets, pools and their collaborators.
//!
//! - [`MarketEngine`]: registry and public API over every market and pool
//! - [`Shard`]: one market's or pool's state behind a FIFO [`WorkQueue`]
//!   with bounded admission (`Busy` when full)
//! - [`RiskManager`], [`PriceOracle`], [`AuditSink`]: pluggable collaborators,
//!   with [`RiskKernel`], [`StaticPriceOracle`] and several sinks provided
//! - [`ExpirySweeper`]: tokio task that expires resting orders
//!
//! ## Concurrency Model
//!
//! ```text
//!  caller ──► registry (read lock, Arc clone) ──► shard queue ──► &mut state
//!                                                   │
//!            reads ─────────────────────────────────┴──► &state (read lock)
//! ```
//!
//! Mutations on one market or pool run one at a time in arrival order.
//! Different markets and pools proceed in parallel.

pub mod audit;
pub mod collaborators;
pub mod engine;
pub mod market;
pub mod risk_kernel;
pub mod routes;
pub mod scheduler;
pub mod shard;
pub mod telemetry;
pub mod work_queue;

pub use audit::{ChannelAuditSink, MemoryAuditSink, NullAuditSink, TracingAuditSink};
pub use collaborators::{AuditSink, PermissiveRisk, PriceOracle, RiskManager, StaticPriceOracle};
pub use engine::MarketEngine;
pub use market::{MarketState, Placement};
pub use risk_kernel::RiskKernel;
pub use routes::RouteIndex;
pub use scheduler::ExpirySweeper;
pub use shard::Shard;
pub use telemetry::init_tracing;
pub use work_queue::{WorkPermit, WorkQueue};
