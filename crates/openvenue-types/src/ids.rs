//! Identifiers used throughout OpenVenue.
//!
//! Orders and trades use UUIDs. Orders get either a UUIDv7 (client-generated)
//! or a deterministic id derived from the market and its submission sequence,
//! so replaying the same calls on a fresh engine yields the same ids.
//! Users, markets, outcomes, pools and assets are caller-chosen strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

fn uuid_from_digest(hasher: Sha256) -> Uuid {
    let hash = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    Uuid::from_bytes(bytes)
}

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Globally unique order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Deterministic `OrderId` from the market and the order's submission
    /// sequence within that market.
    #[must_use]
    pub fn deterministic(market: &MarketId, sequence: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"openvenue:order_id:v1:");
        hasher.update(market.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(sequence.to_le_bytes());
        Self(uuid_from_digest(hasher))
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TradeId
// ---------------------------------------------------------------------------

/// Trade identifier, derived from the market and the market-wide fill
/// sequence so that identical call sequences produce identical trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TradeId(pub Uuid);

impl TradeId {
    #[must_use]
    pub fn deterministic(market: &MarketId, fill_sequence: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"openvenue:trade_id:v1:");
        hasher.update(market.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(fill_sequence.to_le_bytes());
        Self(uuid_from_digest(hasher))
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// String identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// A trading account.
    UserId
);
string_id!(
    /// A market (prediction or derivative).
    MarketId
);
string_id!(
    /// One outcome of a market, e.g. `YES` / `NO`. Derivative markets have
    /// a single outcome.
    OutcomeId
);
string_id!(
    /// A constant-product liquidity pool.
    PoolId
);
string_id!(
    /// A token or underlying asset symbol.
    AssetId
);

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

/// A tradable (market, outcome) pair. Each instrument has its own book and
/// its own positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Instrument {
    pub market: MarketId,
    pub outcome: OutcomeId,
}

impl Instrument {
    #[must_use]
    pub fn new(market: MarketId, outcome: OutcomeId) -> Self {
        Self { market, outcome }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market, self.outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_uniqueness() {
        let a = OrderId::new();
        let b = OrderId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn order_id_deterministic() {
        let m = MarketId::new("BTC-PERP");
        assert_eq!(OrderId::deterministic(&m, 7), OrderId::deterministic(&m, 7));
        assert_ne!(OrderId::deterministic(&m, 7), OrderId::deterministic(&m, 8));
        assert_ne!(
            OrderId::deterministic(&m, 7),
            OrderId::deterministic(&MarketId::new("ETH-PERP"), 7)
        );
    }

    #[test]
    fn trade_id_deterministic() {
        let m = MarketId::new("ELECTION");
        let a = TradeId::deterministic(&m, 0);
        let b = TradeId::deterministic(&m, 0);
        assert_eq!(a, b);
        assert_ne!(a, TradeId::deterministic(&m, 1));
    }

    #[test]
    fn trade_and_order_ids_use_distinct_domains() {
        let m = MarketId::new("M");
        assert_ne!(OrderId::deterministic(&m, 1).0, TradeId::deterministic(&m, 1).0);
    }

    #[test]
    fn instrument_display() {
        let i = Instrument::new(MarketId::new("ELECTION"), OutcomeId::new("YES"));
        assert_eq!(i.to_string(), "ELECTION:YES");
    }

    #[test]
    fn string_ids_serialize_transparently() {
        let user = UserId::new("alice");
        assert_eq!(serde_json::to_string(&user).unwrap(), "\"alice\"");
        let back: UserId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(back, user);
    }
}
