//! # openvenue-amm
//!
//! Constant-product (`x · y = k`) liquidity pools.
//!
//! Each [`LiquidityPool`] holds two reserves, an LP supply and per-provider
//! LP balances. Swaps charge a proportional fee that stays in the pool;
//! liquidity is minted by geometric mean on the first deposit and
//! proportionally afterwards. All arithmetic is checked decimal math (see
//! [`math`]). Pools do no locking; the engine serializes access per pool.

pub mod math;
pub mod pool;
pub mod rebalance;

pub use pool::LiquidityPool;
