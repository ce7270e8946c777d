//! # openvenue-ledger
//!
//! Positions for the OpenVenue engine.
//!
//! - [`PositionLedger`]: signed quantity, average entry price and realized
//!   P&L per `(user, instrument)`, with staged all-or-nothing batches
//! - Market settlement at resolution ([`SettlementSummary`])
//! - [`NetPositionConservation`]: every instrument nets to zero across users

pub mod conservation;
pub mod position_ledger;
pub mod resolution;

pub use conservation::NetPositionConservation;
pub use position_ledger::{PositionFill, PositionLedger, StagedFills, apply_to};
pub use resolution::SettlementSummary;
