//! State owned by one market shard.
//!
//! Everything here runs inside the shard's serialized path: plain `&mut self`
//! methods, no locking, no I/O. Validation always precedes mutation, so a
//! rejected call leaves books, ledger and counters exactly as they were.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use openvenue_ledger::{PositionFill, PositionLedger};
use openvenue_matchcore::{
    BookSnapshot, OrderBook, book_digest, compute_trade_root, execute_plan, plan_match,
};
use openvenue_types::{
    Instrument, MarketConfig, MarketInfo, MarketMetrics, MarketStatus, OpenvenueError, Order,
    OrderId, OrderRequest, OrderStatus, OutcomeId, Position, Resolution, Result, Trade, UserId,
    constants,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::collaborators::RiskManager;

/// Accepted order and the trades it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub order: Order,
    pub trades: Vec<Trade>,
}

#[derive(Debug)]
pub struct MarketState {
    config: MarketConfig,
    status: MarketStatus,
    books: BTreeMap<OutcomeId, OrderBook>,
    ledger: PositionLedger,
    /// Orders that reached a terminal state.
    archive: HashMap<OrderId, Order>,
    trades: Vec<Trade>,
    metrics: MarketMetrics,
    resolution: Option<Resolution>,
    next_order_seq: u64,
    next_fill_seq: u64,
}

impl MarketState {
    /// A new market in `Draft`.
    pub fn new(config: MarketConfig) -> Result<Self> {
        config.validate()?;
        let books = config
            .outcomes
            .iter()
            .map(|o| {
                (
                    o.clone(),
                    OrderBook::new(Instrument::new(config.id.clone(), o.clone())),
                )
            })
            .collect();
        Ok(Self {
            config,
            status: MarketStatus::Draft,
            books,
            ledger: PositionLedger::new(),
            archive: HashMap::new(),
            trades: Vec::new(),
            metrics: MarketMetrics::default(),
            resolution: None,
            next_order_seq: 0,
            next_fill_seq: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    #[must_use]
    pub fn status(&self) -> MarketStatus {
        self.status
    }

    #[must_use]
    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    #[must_use]
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    // =================================================================
    // Lifecycle
    // =================================================================

    /// Move to `next`, returning the previous status.
    pub fn transition(&mut self, next: MarketStatus) -> Result<MarketStatus> {
        self.transition_check(next)?;
        let from = self.status;
        self.status = next;
        Ok(from)
    }

    /// Cancel the market: `Closed → Cancelled`. Resting orders are cancelled,
    /// positions stay as they are.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<Vec<Order>> {
        self.transition_check(MarketStatus::Cancelled)?;
        let cancelled = self.drain_books(now)?;
        self.status = MarketStatus::Cancelled;
        Ok(cancelled)
    }

    fn transition_check(&self, next: MarketStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(OpenvenueError::InvalidTransition {
                market: self.config.id.clone(),
                from: self.status,
                to: next,
            })
        }
    }

    /// Check that the market can be resolved to `outcome`.
    pub fn check_resolvable(&self, outcome: &OutcomeId) -> Result<()> {
        match self.status {
            MarketStatus::Resolved => {
                return Err(OpenvenueError::AlreadyResolved(self.config.id.clone()));
            }
            MarketStatus::Active | MarketStatus::Closed => {}
            status => {
                return Err(OpenvenueError::MarketNotActive {
                    market: self.config.id.clone(),
                    status,
                });
            }
        }
        if !self.books.contains_key(outcome) {
            return Err(OpenvenueError::UnknownOutcome {
                market: self.config.id.clone(),
                outcome: outcome.clone(),
            });
        }
        Ok(())
    }

    /// Resolve to `outcome`: cancel every resting order, settle every open
    /// position at `settlement_prices` and move to `Resolved`.
    pub fn resolve(
        &mut self,
        outcome: OutcomeId,
        settlement_prices: BTreeMap<OutcomeId, Decimal>,
        now: DateTime<Utc>,
    ) -> Result<(Resolution, Vec<Order>)> {
        self.check_resolvable(&outcome)?;
        if let Some(missing) = self.books.keys().find(|o| !settlement_prices.contains_key(*o)) {
            return Err(OpenvenueError::Internal(format!(
                "no settlement price for {}:{missing}",
                self.config.id
            )));
        }

        let summary = self.ledger.settle_market(&self.config.id, &settlement_prices)?;
        let cancelled = self.drain_books(now)?;

        let resolution = Resolution {
            outcome,
            settlement_prices,
            orders_cancelled: cancelled.len(),
            positions_settled: summary.positions_settled,
            realized_pnl: summary.realized_pnl,
            resolved_at: now,
        };
        self.resolution = Some(resolution.clone());
        self.status = MarketStatus::Resolved;
        Ok((resolution, cancelled))
    }

    fn drain_books(&mut self, now: DateTime<Utc>) -> Result<Vec<Order>> {
        let mut cancelled = Vec::new();
        for book in self.books.values_mut() {
            for mut order in book.drain_all() {
                order.close(OrderStatus::Cancelled, now)?;
                cancelled.push(order);
            }
        }
        for order in &cancelled {
            self.archive.insert(order.id, order.clone());
        }
        Ok(cancelled)
    }

    // =================================================================
    // Orders
    // =================================================================

    fn resolve_outcome(&self, requested: Option<&OutcomeId>) -> Result<OutcomeId> {
        match requested {
            Some(outcome) if self.books.contains_key(outcome) => Ok(outcome.clone()),
            Some(outcome) => Err(OpenvenueError::UnknownOutcome {
                market: self.config.id.clone(),
                outcome: outcome.clone(),
            }),
            None if self.config.outcomes.len() == 1 => Ok(self.config.outcomes[0].clone()),
            None => Err(OpenvenueError::Validation {
                reason: format!(
                    "market {} has {} outcomes; the order must name one",
                    self.config.id,
                    self.config.outcomes.len()
                ),
            }),
        }
    }

    fn is_known_order(&self, id: &OrderId) -> bool {
        self.archive.contains_key(id) || self.books.values().any(|b| b.contains_order(id))
    }

    /// Id the next placement of `request` will carry: the caller's, or one
    /// derived from this market and its order sequence.
    #[must_use]
    pub fn next_order_id(&self, request: &OrderRequest) -> OrderId {
        request
            .id
            .unwrap_or_else(|| OrderId::deterministic(&self.config.id, self.next_order_seq))
    }

    /// Validate, risk-check and match one order.
    pub fn place(
        &mut self,
        request: &OrderRequest,
        risk: &dyn RiskManager,
        default_ttl_secs: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Placement> {
        request.validate_shape()?;
        if !self.status.accepts_orders() {
            return Err(OpenvenueError::MarketNotActive {
                market: self.config.id.clone(),
                status: self.status,
            });
        }
        let outcome = self.resolve_outcome(request.outcome.as_ref())?;
        if self.config.kind.is_prediction() && request.price > constants::PREDICTION_MAX_PRICE {
            return Err(OpenvenueError::Validation {
                reason: format!(
                    "prediction price {} outside (0, {}]",
                    request.price,
                    constants::PREDICTION_MAX_PRICE
                ),
            });
        }
        if request.quantity < self.config.min_order_size {
            return Err(OpenvenueError::Validation {
                reason: format!(
                    "quantity {} below minimum {}",
                    request.quantity, self.config.min_order_size
                ),
            });
        }
        let expires_at = match (request.expires_at, default_ttl_secs) {
            (Some(at), _) => Some(at),
            (None, Some(ttl)) => Some(
                i64::try_from(ttl)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .and_then(|d| now.checked_add_signed(d))
                    .ok_or_else(|| {
                        OpenvenueError::Configuration(format!("order ttl {ttl}s out of range"))
                    })?,
            ),
            (None, None) => None,
        };
        if expires_at.is_some_and(|at| at <= now) {
            return Err(OpenvenueError::Validation {
                reason: "order expiry is not in the future".to_string(),
            });
        }

        let sequence = self.next_order_seq;
        let id = self.next_order_id(request);
        if self.is_known_order(&id) {
            return Err(OpenvenueError::DuplicateOrder(id));
        }

        let order = Order {
            id,
            market: self.config.id.clone(),
            outcome: outcome.clone(),
            owner: request.owner.clone(),
            side: request.side,
            price: request.price,
            quantity: request.quantity,
            filled_qty: Decimal::ZERO,
            status: OrderStatus::Pending,
            sequence,
            created_at: now,
            updated_at: now,
            expires_at,
        };
        risk.check_limits(&order)?;

        let book = self
            .books
            .get_mut(&outcome)
            .ok_or_else(|| OpenvenueError::Internal(format!("no book for {outcome}")))?;
        let plan = plan_match(book, &order, self.config.prevent_self_trade);

        // Stage both sides of every planned fill before touching the book.
        let instrument = book.instrument.clone();
        let fills: Vec<PositionFill> = plan
            .fills
            .iter()
            .flat_map(|f| {
                let signed = f.quantity * order.side.sign();
                [
                    PositionFill::new(order.owner.clone(), instrument.clone(), signed, f.price),
                    PositionFill::new(f.resting_owner.clone(), instrument.clone(), -signed, f.price),
                ]
            })
            .collect();
        let staged = self.ledger.stage(&fills)?;

        let matched = execute_plan(book, order, &plan, &mut self.next_fill_seq, now)?;
        self.ledger.commit(staged);
        self.next_order_seq += 1;

        for trade in &matched.trades {
            self.metrics.trade_count += 1;
            self.metrics.volume += trade.quantity;
            self.metrics.notional += trade.notional();
            self.metrics.last_price = Some(trade.price);
        }
        for done in matched.completed {
            self.archive.insert(done.id, done);
        }
        if !matched.rested {
            self.archive.insert(matched.order.id, matched.order.clone());
        }
        self.trades.extend(matched.trades.iter().cloned());

        Ok(Placement {
            order: matched.order,
            trades: matched.trades,
        })
    }

    /// Cancel a live order owned by `requester`.
    pub fn cancel_order(
        &mut self,
        order_id: &OrderId,
        requester: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        if let Some(done) = self.archive.get(order_id) {
            return Err(OpenvenueError::AlreadyTerminal {
                order_id: *order_id,
                status: done.status,
            });
        }
        let book = self
            .books
            .values_mut()
            .find(|b| b.contains_order(order_id))
            .ok_or(OpenvenueError::OrderNotFound(*order_id))?;
        let owner = book
            .get(order_id)
            .map(|o| o.owner.clone())
            .ok_or(OpenvenueError::OrderNotFound(*order_id))?;
        if owner != *requester {
            return Err(OpenvenueError::Unauthorized {
                order_id: *order_id,
                requester: requester.clone(),
            });
        }
        let mut order = book.cancel_order(order_id)?;
        order.close(OrderStatus::Cancelled, now)?;
        self.archive.insert(order.id, order.clone());
        Ok(order)
    }

    /// Remove every resting order whose expiry is at or before `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<Vec<Order>> {
        let mut expired = Vec::new();
        for book in self.books.values_mut() {
            for mut order in book.expire_before(now) {
                order.close(OrderStatus::Expired, now)?;
                expired.push(order);
            }
        }
        for order in &expired {
            self.archive.insert(order.id, order.clone());
        }
        Ok(expired)
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn get_order(&self, order_id: &OrderId) -> Option<Order> {
        self.books
            .values()
            .find_map(|b| b.get(order_id))
            .or_else(|| self.archive.get(order_id))
            .cloned()
    }

    pub fn book(&self, outcome: &OutcomeId) -> Result<BookSnapshot> {
        self.books
            .get(outcome)
            .map(OrderBook::snapshot)
            .ok_or_else(|| OpenvenueError::UnknownOutcome {
                market: self.config.id.clone(),
                outcome: outcome.clone(),
            })
    }

    #[must_use]
    pub fn books(&self) -> Vec<BookSnapshot> {
        self.books.values().map(OrderBook::snapshot).collect()
    }

    #[must_use]
    pub fn positions_of(&self, user: &UserId) -> Vec<Position> {
        self.ledger.get(user)
    }

    #[must_use]
    pub fn info(&self) -> MarketInfo {
        MarketInfo {
            id: self.config.id.clone(),
            title: self.config.title.clone(),
            kind: self.config.kind.clone(),
            outcomes: self.config.outcomes.clone(),
            status: self.status,
            resolution: self.resolution.clone(),
            metrics: self.metrics.clone(),
            open_orders: self.books.values().map(OrderBook::order_count).sum(),
        }
    }

    /// Digest of books, positions, trades and counters. Timestamps excluded.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"openvenue:market:v1:");
        hasher.update(self.config.id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.status.to_string().as_bytes());
        hasher.update(self.next_order_seq.to_le_bytes());
        hasher.update(self.next_fill_seq.to_le_bytes());
        for book in self.books.values() {
            hasher.update(book_digest(book));
        }
        hasher.update(compute_trade_root(&self.trades));

        let mut positions: Vec<&Position> = self.ledger.positions_where(|_| true).collect();
        positions.sort_by(|a, b| (&a.user, &a.instrument).cmp(&(&b.user, &b.instrument)));
        for p in positions {
            hasher.update(p.user.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(p.instrument.outcome.as_str().as_bytes());
            hasher.update([0u8]);
            for value in [p.quantity, p.avg_entry_price, p.realized_pnl] {
                hasher.update(value.normalize().to_string().as_bytes());
                hasher.update([0u8]);
            }
        }

        let mut archived: Vec<&Order> = self.archive.values().collect();
        archived.sort_by_key(|o| o.sequence);
        for order in archived {
            hasher.update(order.id.0.as_bytes());
            hasher.update(order.status.to_string().as_bytes());
            hasher.update(order.filled_qty.normalize().to_string().as_bytes());
        }

        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }
}

#[cfg(test)]
mod tests {
    use openvenue_types::{MarketId, MarketKind, OrderSide};

    use super::*;
    use crate::collaborators::PermissiveRisk;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn active_binary() -> MarketState {
        let mut m = MarketState::new(MarketConfig::binary("ELECTION", "Who wins?")).unwrap();
        m.transition(MarketStatus::Active).unwrap();
        m
    }

    fn place(
        m: &mut MarketState,
        owner: &str,
        side: OrderSide,
        price: &str,
        qty: &str,
    ) -> Result<Placement> {
        let req =
            OrderRequest::limit("ELECTION", owner, side, dec(price), dec(qty)).on_outcome("YES");
        m.place(&req, &PermissiveRisk, None, Utc::now())
    }

    #[test]
    fn draft_market_rejects_orders() {
        let mut m = MarketState::new(MarketConfig::binary("ELECTION", "t")).unwrap();
        let err = place(&mut m, "alice", OrderSide::Buy, "0.5", "1").unwrap_err();
        assert!(matches!(err, OpenvenueError::MarketNotActive { .. }));
    }

    #[test]
    fn prediction_price_capped_at_one() {
        let mut m = active_binary();
        let err = place(&mut m, "alice", OrderSide::Buy, "1.01", "1").unwrap_err();
        assert!(matches!(err, OpenvenueError::Validation { .. }));
        assert!(place(&mut m, "alice", OrderSide::Buy, "1", "1").is_ok());
    }

    #[test]
    fn outcome_required_for_multi_outcome_markets() {
        let mut m = active_binary();
        let req = OrderRequest::limit("ELECTION", "alice", OrderSide::Buy, dec("0.5"), dec("1"));
        assert!(matches!(
            m.place(&req, &PermissiveRisk, None, Utc::now()),
            Err(OpenvenueError::Validation { .. })
        ));
        let req = req.on_outcome("MAYBE");
        assert!(matches!(
            m.place(&req, &PermissiveRisk, None, Utc::now()),
            Err(OpenvenueError::UnknownOutcome { .. })
        ));
    }

    #[test]
    fn deterministic_ids_follow_sequence() {
        let mut m = active_binary();
        let a = place(&mut m, "alice", OrderSide::Buy, "0.4", "1").unwrap();
        let b = place(&mut m, "bob", OrderSide::Buy, "0.4", "1").unwrap();
        assert_eq!(a.order.id, OrderId::deterministic(&MarketId::new("ELECTION"), 0));
        assert_eq!(b.order.id, OrderId::deterministic(&MarketId::new("ELECTION"), 1));
        assert_eq!(b.order.sequence, 1);
    }

    #[test]
    fn rejected_order_changes_nothing() {
        let mut m = active_binary();
        place(&mut m, "alice", OrderSide::Sell, "0.6", "5").unwrap();
        let before = m.digest();
        assert!(place(&mut m, "bob", OrderSide::Buy, "0.6", "-1").is_err());
        assert!(place(&mut m, "bob", OrderSide::Buy, "2", "1").is_err());
        assert_eq!(m.digest(), before);
    }

    #[test]
    fn duplicate_client_id_rejected() {
        let mut m = active_binary();
        let id = OrderId::new();
        let req = OrderRequest::limit("ELECTION", "alice", OrderSide::Buy, dec("0.5"), dec("1"))
            .on_outcome("YES")
            .with_id(id);
        m.place(&req, &PermissiveRisk, None, Utc::now()).unwrap();
        assert!(matches!(
            m.place(&req, &PermissiveRisk, None, Utc::now()),
            Err(OpenvenueError::DuplicateOrder(_))
        ));
    }

    #[test]
    fn cancel_rules() {
        let mut m = active_binary();
        let placed = place(&mut m, "alice", OrderSide::Buy, "0.4", "3").unwrap();
        let id = placed.order.id;
        let now = Utc::now();

        assert!(matches!(
            m.cancel_order(&id, &UserId::new("mallory"), now),
            Err(OpenvenueError::Unauthorized { .. })
        ));
        let cancelled = m.cancel_order(&id, &UserId::new("alice"), now).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(matches!(
            m.cancel_order(&id, &UserId::new("alice"), now),
            Err(OpenvenueError::AlreadyTerminal {
                status: OrderStatus::Cancelled,
                ..
            })
        ));
        assert!(matches!(
            m.cancel_order(&OrderId::new(), &UserId::new("alice"), now),
            Err(OpenvenueError::OrderNotFound(_))
        ));
    }

    #[test]
    fn expiry_sweeps_due_orders() {
        let mut m = active_binary();
        let now = Utc::now();
        let req = OrderRequest::limit("ELECTION", "alice", OrderSide::Buy, dec("0.4"), dec("1"))
            .on_outcome("YES")
            .expiring_at(now + Duration::seconds(10));
        let placed = m.place(&req, &PermissiveRisk, None, now).unwrap();
        place(&mut m, "bob", OrderSide::Buy, "0.3", "1").unwrap();

        assert!(m.expire(now).unwrap().is_empty());
        let expired = m.expire(now + Duration::seconds(10)).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status, OrderStatus::Expired);
        assert_eq!(m.get_order(&placed.order.id).unwrap().status, OrderStatus::Expired);
        assert_eq!(m.info().open_orders, 1);
    }

    #[test]
    fn past_expiry_rejected() {
        let mut m = active_binary();
        let now = Utc::now();
        let req = OrderRequest::limit("ELECTION", "alice", OrderSide::Buy, dec("0.4"), dec("1"))
            .on_outcome("YES")
            .expiring_at(now);
        assert!(m.place(&req, &PermissiveRisk, None, now).is_err());
    }

    #[test]
    fn resolution_status_rules() {
        let mut m = active_binary();
        m.transition(MarketStatus::Suspended).unwrap();
        assert!(matches!(
            m.check_resolvable(&OutcomeId::new("YES")),
            Err(OpenvenueError::MarketNotActive { .. })
        ));
        m.transition(MarketStatus::Closed).unwrap();
        assert!(m.check_resolvable(&OutcomeId::new("YES")).is_ok());
        assert!(matches!(
            m.check_resolvable(&OutcomeId::new("MAYBE")),
            Err(OpenvenueError::UnknownOutcome { .. })
        ));
        assert!(matches!(
            m.transition(MarketStatus::Draft),
            Err(OpenvenueError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn derivative_defaults_single_outcome() {
        let mut m = MarketState::new(MarketConfig::derivative("BTC-PERP", "BTC", "BTC")).unwrap();
        assert!(matches!(m.config().kind, MarketKind::Derivative { .. }));
        m.transition(MarketStatus::Active).unwrap();
        let req = OrderRequest::limit("BTC-PERP", "alice", OrderSide::Buy, dec("50000"), dec("1"));
        let placed = m.place(&req, &PermissiveRisk, None, Utc::now()).unwrap();
        assert_eq!(placed.order.outcome, OutcomeId::new(constants::DEFAULT_OUTCOME));
    }

    #[test]
    fn placement_serializes_trades() {
        let mut m = active_binary();
        place(&mut m, "alice", OrderSide::Sell, "0.55", "2").unwrap();
        let placed = place(&mut m, "bob", OrderSide::Buy, "0.6", "2").unwrap();
        let json = serde_json::to_value(&placed).unwrap();
        assert_eq!(json["order"]["status"], "Filled");
        assert_eq!(json["trades"][0]["price"], "0.55");
        assert_eq!(json["trades"].as_array().map(Vec::len), Some(1));
    }
}
