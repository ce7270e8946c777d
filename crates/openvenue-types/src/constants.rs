//! System-wide constants for the OpenVenue core.

use rust_decimal::Decimal;

/// Default bound on queued mutations per shard.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default wait for a queue slot under the blocking backpressure policy.
pub const DEFAULT_BLOCK_TIMEOUT_MS: u64 = 250;

/// Default lifetime of a resting order (24 hours).
pub const DEFAULT_ORDER_TTL_SECS: u64 = 86_400;

/// Default period of the order-expiry sweep.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;

/// Default capacity of the channel audit sink.
pub const DEFAULT_AUDIT_BUFFER: usize = 4_096;

/// Outcome used by single-outcome (derivative) markets.
pub const DEFAULT_OUTCOME: &str = "MAIN";

/// Outcomes of a binary prediction market.
pub const OUTCOME_YES: &str = "YES";
pub const OUTCOME_NO: &str = "NO";

/// Highest price a prediction outcome can trade at.
pub const PREDICTION_MAX_PRICE: Decimal = Decimal::ONE;

/// Default decimal places kept on pool outputs and LP mints.
pub const DEFAULT_AMOUNT_SCALE: u32 = 18;

/// Largest scale `rust_decimal` can represent.
pub const MAX_DECIMAL_SCALE: u32 = 28;

/// Default spot/reference deviation (5%) that triggers a rebalance signal.
pub const DEFAULT_REBALANCE_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Default price band for the risk kernel (50% either side of reference).
pub const DEFAULT_MAX_PRICE_DEVIATION: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "OpenVenue";
