//! The market engine: registry of market and pool shards.
//!
//! ```text
//! MarketEngine
//!  ├── markets: RwLock<HashMap<MarketId, Arc<Shard<MarketState>>>>
//!  ├── pools:   RwLock<HashMap<PoolId,   Arc<Shard<LiquidityPool>>>>
//!  ├── routes:  RouteIndex (OrderId → MarketId, striped)
//!  └── risk / oracle / audit collaborators
//! ```
//!
//! Registry locks are held only long enough to look up or insert an `Arc`.
//! All state work happens inside one shard, so operations on different
//! markets or pools never contend beyond one route stripe. Order ids are
//! unique engine-wide. Audit events are emitted after the shard's turn has
//! ended.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use openvenue_amm::LiquidityPool;
use openvenue_matchcore::BookSnapshot;
use openvenue_types::{
    AssetId, AuditEvent, EngineConfig, LiquidityReceipt, MarketConfig, MarketFilter, MarketId,
    MarketInfo, MarketKind, MarketStatus, OpenvenueError, Order, OrderId, OrderRequest, OutcomeId,
    PoolConfig, PoolId, PoolSnapshot, Position, RebalanceSignal, RemovalReceipt, Resolution,
    Result, SwapReceipt, Trade, UserId,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::audit::NullAuditSink;
use crate::collaborators::{AuditSink, PermissiveRisk, PriceOracle, RiskManager, StaticPriceOracle};
use crate::market::{MarketState, Placement};
use crate::routes::RouteIndex;
use crate::shard::Shard;

type MarketShard = Arc<Shard<MarketState>>;
type PoolShard = Arc<Shard<LiquidityPool>>;

pub struct MarketEngine {
    config: EngineConfig,
    markets: RwLock<HashMap<MarketId, MarketShard>>,
    pools: RwLock<HashMap<PoolId, PoolShard>>,
    routes: RouteIndex,
    risk: Arc<dyn RiskManager>,
    oracle: Arc<dyn PriceOracle>,
    audit: Arc<dyn AuditSink>,
}

impl MarketEngine {
    /// Engine with permissive risk, an empty static oracle and no audit.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            markets: RwLock::new(HashMap::new()),
            pools: RwLock::new(HashMap::new()),
            routes: RouteIndex::new(),
            risk: Arc::new(PermissiveRisk),
            oracle: Arc::new(StaticPriceOracle::new()),
            audit: Arc::new(NullAuditSink),
        })
    }

    #[must_use]
    pub fn with_risk_manager(mut self, risk: Arc<dyn RiskManager>) -> Self {
        self.risk = risk;
        self
    }

    #[must_use]
    pub fn with_price_oracle(mut self, oracle: Arc<dyn PriceOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn market(&self, id: &MarketId) -> Result<MarketShard> {
        self.markets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| OpenvenueError::MarketNotFound(id.clone()))
    }

    fn pool(&self, id: &PoolId) -> Result<PoolShard> {
        self.pools
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| OpenvenueError::PoolNotFound(id.clone()))
    }

    /// Every market shard, in market id order.
    fn market_shards(&self) -> Vec<(MarketId, MarketShard)> {
        let mut all: Vec<_> = self
            .markets
            .read()
            .iter()
            .map(|(id, shard)| (id.clone(), Arc::clone(shard)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    fn pool_shards(&self) -> Vec<(PoolId, PoolShard)> {
        let mut all: Vec<_> = self
            .pools
            .read()
            .iter()
            .map(|(id, shard)| (id.clone(), Arc::clone(shard)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    fn new_shard<S>(&self, name: String, state: S) -> Arc<Shard<S>> {
        Arc::new(Shard::new(
            name,
            state,
            self.config.queue_capacity,
            self.config.backpressure,
        ))
    }

    // =================================================================
    // Market lifecycle
    // =================================================================

    /// Register a market in `Draft`.
    pub fn create_market(&self, config: MarketConfig) -> Result<MarketInfo> {
        let id = config.id.clone();
        let state = MarketState::new(config)?;
        let info = state.info();
        {
            let mut markets = self.markets.write();
            if markets.contains_key(&id) {
                return Err(OpenvenueError::DuplicateMarket(id));
            }
            markets.insert(id.clone(), self.new_shard(format!("market:{id}"), state));
        }
        tracing::info!(market = %id, "Market created");
        self.audit.record(AuditEvent::MarketCreated { market: id });
        Ok(info)
    }

    fn transition(&self, id: &MarketId, to: MarketStatus) -> Result<MarketInfo> {
        let (from, info) = self.market(id)?.mutate(|m| {
            let from = m.transition(to)?;
            Ok((from, m.info()))
        })?;
        tracing::info!(market = %id, %from, %to, "Market status changed");
        self.audit.record(AuditEvent::MarketStatusChanged {
            market: id.clone(),
            from,
            to,
        });
        Ok(info)
    }

    /// `Draft | Suspended → Active`.
    pub fn activate_market(&self, id: &MarketId) -> Result<MarketInfo> {
        self.transition(id, MarketStatus::Active)
    }

    /// `Active → Suspended`. Resting orders stay; no new orders are accepted.
    pub fn suspend_market(&self, id: &MarketId) -> Result<MarketInfo> {
        self.transition(id, MarketStatus::Suspended)
    }

    /// `Active | Suspended → Closed`.
    pub fn close_market(&self, id: &MarketId) -> Result<MarketInfo> {
        self.transition(id, MarketStatus::Closed)
    }

    /// `Closed → Cancelled`. Cancels every resting order without settling.
    pub fn cancel_market(&self, id: &MarketId) -> Result<MarketInfo> {
        let now = Utc::now();
        let (cancelled, info) = self.market(id)?.mutate(|m| {
            let cancelled = m.cancel(now)?;
            Ok((cancelled, m.info()))
        })?;
        tracing::info!(market = %id, orders = cancelled.len(), "Market cancelled");
        self.audit.record(AuditEvent::MarketStatusChanged {
            market: id.clone(),
            from: MarketStatus::Closed,
            to: MarketStatus::Cancelled,
        });
        for order in &cancelled {
            self.audit.record(AuditEvent::OrderCancelled {
                order_id: order.id,
                market: id.clone(),
            });
        }
        Ok(info)
    }

    /// Resolve a market to `outcome`.
    ///
    /// Prediction markets settle the winning outcome at 1 and every other
    /// outcome at 0; derivative markets settle at the oracle price of the
    /// underlying. All resting orders are cancelled and every open position
    /// is closed at its settlement price.
    ///
    /// # Errors
    /// `AlreadyResolved`, `UnknownOutcome`, `MarketNotActive` (Draft,
    /// Suspended or Cancelled), `Oracle` for a missing derivative price.
    pub fn resolve_market(&self, id: &MarketId, outcome: &OutcomeId) -> Result<Resolution> {
        let now = Utc::now();
        let (resolution, cancelled) = self.market(id)?.mutate(|m| {
            m.check_resolvable(outcome)?;
            let prices: BTreeMap<OutcomeId, Decimal> = match &m.config().kind {
                MarketKind::Prediction => m
                    .config()
                    .outcomes
                    .iter()
                    .map(|o| {
                        let price = if o == outcome { Decimal::ONE } else { Decimal::ZERO };
                        (o.clone(), price)
                    })
                    .collect(),
                MarketKind::Derivative { underlying } => {
                    let price = self.oracle.get_price(underlying)?;
                    m.config().outcomes.iter().map(|o| (o.clone(), price)).collect()
                }
            };
            m.resolve(outcome.clone(), prices, now)
        })?;

        tracing::info!(
            market = %id,
            outcome = %outcome,
            positions = resolution.positions_settled,
            orders = resolution.orders_cancelled,
            "Market resolved"
        );
        for order in &cancelled {
            self.audit.record(AuditEvent::OrderCancelled {
                order_id: order.id,
                market: id.clone(),
            });
        }
        self.audit.record(AuditEvent::MarketResolved {
            market: id.clone(),
            resolution: resolution.clone(),
        });
        Ok(resolution)
    }

    /// Drop a resolved or cancelled market and the routes of its orders.
    ///
    /// Its orders, trades and positions stop being queryable; the id may be
    /// registered again.
    ///
    /// # Errors
    /// `MarketNotFound`, or `Validation` while the market is not final.
    pub fn remove_market(&self, id: &MarketId) -> Result<()> {
        {
            let mut markets = self.markets.write();
            let shard = markets
                .get(id)
                .ok_or_else(|| OpenvenueError::MarketNotFound(id.clone()))?;
            let status = shard.read(MarketState::status);
            if !status.is_final() {
                return Err(OpenvenueError::Validation {
                    reason: format!("market {id} is {status}; only final markets can be removed"),
                });
            }
            markets.remove(id);
        }
        let routes_evicted = self.routes.evict_market(id);
        tracing::info!(market = %id, routes_evicted, "Market removed");
        self.audit.record(AuditEvent::MarketRemoved {
            market: id.clone(),
            routes_evicted,
        });
        Ok(())
    }

    // =================================================================
    // Orders
    // =================================================================

    /// Validate, risk-check and match a limit order. Leftover quantity rests.
    ///
    /// # Errors
    /// `DuplicateOrder` if any market already holds an order under the
    /// request's id, plus everything [`MarketState::place`] rejects.
    pub fn place_order(&self, request: OrderRequest) -> Result<Placement> {
        let shard = self.market(&request.market)?;
        let ttl = self.config.default_order_ttl_secs;
        let now = Utc::now();
        let result = shard.mutate(|m| {
            request.validate_shape()?;
            let id = m.next_order_id(&request);
            if !self.routes.claim(id, &request.market) {
                return Err(OpenvenueError::DuplicateOrder(id));
            }
            m.place(&request, self.risk.as_ref(), ttl, now)
                .inspect_err(|_| self.routes.release(&id))
        });

        match result {
            Ok(placed) => {
                tracing::debug!(
                    order = %placed.order.id,
                    market = %request.market,
                    trades = placed.trades.len(),
                    remaining = %placed.order.remaining(),
                    "Order accepted"
                );
                self.audit.record(AuditEvent::OrderAccepted {
                    order_id: placed.order.id,
                    market: request.market.clone(),
                    owner: request.owner.clone(),
                    remaining: placed.order.remaining(),
                });
                for trade in &placed.trades {
                    self.audit.record(AuditEvent::TradeExecuted {
                        trade: trade.clone(),
                    });
                }
                Ok(placed)
            }
            Err(err) => {
                if !matches!(err, OpenvenueError::Busy { .. }) {
                    tracing::debug!(market = %request.market, owner = %request.owner, error = %err, "Order rejected");
                    self.audit.record(AuditEvent::OrderRejected {
                        market: request.market.clone(),
                        owner: request.owner.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err)
            }
        }
    }

    /// Cancel a resting order. Only its owner may cancel it.
    ///
    /// # Errors
    /// `OrderNotFound`, `Unauthorized`, or `AlreadyTerminal` for an order
    /// that was already filled, cancelled or expired.
    pub fn cancel_order(&self, order_id: &OrderId, requester: &UserId) -> Result<Order> {
        let market = self
            .routes
            .get(order_id)
            .ok_or(OpenvenueError::OrderNotFound(*order_id))?;
        let now = Utc::now();
        let order = self
            .market(&market)?
            .mutate(|m| m.cancel_order(order_id, requester, now))?;
        tracing::debug!(order = %order_id, market = %market, "Order cancelled");
        self.audit.record(AuditEvent::OrderCancelled {
            order_id: *order_id,
            market,
        });
        Ok(order)
    }

    /// Current state of an order, live or terminal.
    pub fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        let market = self
            .routes
            .get(order_id)
            .ok_or(OpenvenueError::OrderNotFound(*order_id))?;
        self.market(&market)?
            .read(|m| m.get_order(order_id))
            .ok_or(OpenvenueError::OrderNotFound(*order_id))
    }

    /// Resting orders of one outcome: bids best first, asks best first.
    pub fn get_order_book(&self, market: &MarketId, outcome: &OutcomeId) -> Result<BookSnapshot> {
        self.market(market)?.read(|m| m.book(outcome))
    }

    /// Books of every outcome of a market, in outcome order.
    pub fn get_order_books(&self, market: &MarketId) -> Result<Vec<BookSnapshot>> {
        Ok(self.market(market)?.read(MarketState::books))
    }

    /// Trades of a market in execution order.
    pub fn get_trades(&self, market: &MarketId) -> Result<Vec<Trade>> {
        Ok(self.market(market)?.read(|m| m.trades().to_vec()))
    }

    /// Expire every resting order due at `now`, market by market.
    ///
    /// A market whose queue is full is skipped until the next sweep.
    pub fn expire_orders(&self, now: DateTime<Utc>) -> usize {
        let mut total = 0;
        for (id, shard) in self.market_shards() {
            match shard.mutate(|m| m.expire(now)) {
                Ok(expired) => {
                    total += expired.len();
                    for order in expired {
                        self.audit.record(AuditEvent::OrderExpired {
                            order_id: order.id,
                            market: id.clone(),
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(market = %id, error = %err, "Expiry sweep skipped market");
                }
            }
        }
        if total > 0 {
            tracing::debug!(expired = total, "Expired orders");
        }
        total
    }

    // =================================================================
    // Positions and market queries
    // =================================================================

    /// Every position of `user` across markets.
    #[must_use]
    pub fn get_positions(&self, user: &UserId) -> Vec<Position> {
        self.market_shards()
            .into_iter()
            .flat_map(|(_, shard)| shard.read(|m| m.positions_of(user)))
            .collect()
    }

    #[must_use]
    pub fn get_all_positions(&self) -> HashMap<UserId, Vec<Position>> {
        let mut all: HashMap<UserId, Vec<Position>> = HashMap::new();
        for (_, shard) in self.market_shards() {
            for (user, positions) in shard.read(|m| m.ledger().get_all()) {
                all.entry(user).or_default().extend(positions);
            }
        }
        all
    }

    pub fn market_info(&self, id: &MarketId) -> Result<MarketInfo> {
        Ok(self.market(id)?.read(MarketState::info))
    }

    /// Markets matching `filter`, in id order.
    #[must_use]
    pub fn list_markets(&self, filter: &MarketFilter) -> Vec<MarketInfo> {
        self.market_shards()
            .into_iter()
            .map(|(_, shard)| shard.read(MarketState::info))
            .filter(|info| filter.matches(info))
            .collect()
    }

    // =================================================================
    // Pools
    // =================================================================

    pub fn create_pool(&self, config: PoolConfig) -> Result<PoolSnapshot> {
        let id = config.id.clone();
        let pool = LiquidityPool::new(config)?;
        let snapshot = pool.snapshot();
        {
            let mut pools = self.pools.write();
            if pools.contains_key(&id) {
                return Err(OpenvenueError::DuplicatePool(id));
            }
            pools.insert(id.clone(), self.new_shard(format!("pool:{id}"), pool));
        }
        tracing::info!(pool = %id, token_a = %snapshot.token_a, token_b = %snapshot.token_b, "Pool created");
        self.audit.record(AuditEvent::PoolCreated { pool: id });
        Ok(snapshot)
    }

    /// Output for swapping `amount_in` of `token_in`. Read-only.
    pub fn quote(&self, pool: &PoolId, token_in: &AssetId, amount_in: Decimal) -> Result<Decimal> {
        self.pool(pool)?.read(|p| p.quote(token_in, amount_in))
    }

    pub fn swap(
        &self,
        pool: &PoolId,
        trader: &UserId,
        token_in: &AssetId,
        amount_in: Decimal,
        min_amount_out: Decimal,
    ) -> Result<SwapReceipt> {
        let receipt = self
            .pool(pool)?
            .mutate(|p| p.swap(trader, token_in, amount_in, min_amount_out))?;
        self.audit.record(AuditEvent::Swap {
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    pub fn add_liquidity(
        &self,
        pool: &PoolId,
        provider: &UserId,
        amount_a: Decimal,
        amount_b: Decimal,
        min_lp_out: Decimal,
    ) -> Result<LiquidityReceipt> {
        let receipt = self
            .pool(pool)?
            .mutate(|p| p.add_liquidity(provider, amount_a, amount_b, min_lp_out))?;
        self.audit.record(AuditEvent::LiquidityAdded {
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    pub fn remove_liquidity(
        &self,
        pool: &PoolId,
        provider: &UserId,
        lp_tokens: Decimal,
        min_amount_a: Decimal,
        min_amount_b: Decimal,
    ) -> Result<RemovalReceipt> {
        let receipt = self
            .pool(pool)?
            .mutate(|p| p.remove_liquidity(provider, lp_tokens, min_amount_a, min_amount_b))?;
        self.audit.record(AuditEvent::LiquidityRemoved {
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    pub fn pause_pool(&self, pool: &PoolId) -> Result<()> {
        self.pool(pool)?.mutate(LiquidityPool::pause)?;
        tracing::info!(pool = %pool, "Pool paused");
        self.audit.record(AuditEvent::PoolPauseChanged {
            pool: pool.clone(),
            paused: true,
        });
        Ok(())
    }

    pub fn unpause_pool(&self, pool: &PoolId) -> Result<()> {
        self.pool(pool)?.mutate(LiquidityPool::unpause)?;
        tracing::info!(pool = %pool, "Pool unpaused");
        self.audit.record(AuditEvent::PoolPauseChanged {
            pool: pool.clone(),
            paused: false,
        });
        Ok(())
    }

    pub fn pool_snapshot(&self, pool: &PoolId) -> Result<PoolSnapshot> {
        Ok(self.pool(pool)?.read(LiquidityPool::snapshot))
    }

    pub fn lp_balance(&self, pool: &PoolId, provider: &UserId) -> Result<Decimal> {
        Ok(self.pool(pool)?.read(|p| p.lp_balance(provider)))
    }

    /// Compare a pool's spot price with the oracle's `token_a / token_b`
    /// cross price.
    ///
    /// # Errors
    /// `PoolNotFound`, `Oracle` when either token has no usable price, plus
    /// everything [`check_rebalance_at`](Self::check_rebalance_at) rejects.
    pub fn check_rebalance(&self, pool: &PoolId) -> Result<RebalanceSignal> {
        let shard = self.pool(pool)?;
        let (token_a, token_b) = shard.read(|p| {
            let config = p.config();
            (config.token_a.clone(), config.token_b.clone())
        });
        let price_a = self.oracle.get_price(&token_a)?;
        let price_b = self.oracle.get_price(&token_b)?;
        let reference = price_a
            .checked_div(price_b)
            .ok_or(OpenvenueError::ArithmeticOverflow { op: "oracle cross price" })?;
        tracing::debug!(pool = %pool, %reference, "Rebalance reference from oracle");
        shard.read(|p| p.check_rebalance(reference))
    }

    /// Compare a pool's spot price (`reserve_b / reserve_a`) with an
    /// explicit reference price.
    pub fn check_rebalance_at(&self, pool: &PoolId, reference_price: Decimal) -> Result<RebalanceSignal> {
        self.pool(pool)?.read(|p| p.check_rebalance(reference_price))
    }

    // =================================================================
    // Determinism
    // =================================================================

    /// Hex SHA-256 over every market and pool, in id order.
    ///
    /// Two engines that received the same sequence of calls produce the
    /// same digest. Wall-clock timestamps do not contribute.
    #[must_use]
    pub fn state_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"openvenue:engine:v1:");
        for (id, shard) in self.market_shards() {
            hasher.update(id.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(shard.read(MarketState::digest));
        }
        hasher.update(b"|pools|");
        for (id, shard) in self.pool_shards() {
            hasher.update(id.as_str().as_bytes());
            hasher.update([0u8]);
            shard.read(|p| {
                let (ra, rb) = p.reserves();
                for value in [ra, rb, p.total_lp_supply()] {
                    hasher.update(value.normalize().to_string().as_bytes());
                    hasher.update([0u8]);
                }
                for (provider, balance) in p.lp_balances() {
                    hasher.update(provider.as_str().as_bytes());
                    hasher.update([0u8]);
                    hasher.update(balance.normalize().to_string().as_bytes());
                    hasher.update([0u8]);
                }
                hasher.update([u8::from(p.is_paused())]);
            });
        }
        hex::encode(hasher.finalize())
    }

    #[must_use]
    pub fn market_count(&self) -> usize {
        self.markets.read().len()
    }

    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.read().len()
    }
}
