//! The order book for a single instrument.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids** (buys): `BTreeMap<Reverse<Decimal>, PriceLevel>` -- highest price first
//! - **Asks** (sells): `BTreeMap<Decimal, PriceLevel>` -- lowest price first
//!
//! An auxiliary `HashMap<OrderId, (Side, Price)>` enables O(log N) lookup and cancel.
//! Only live orders (Pending / PartiallyFilled) rest in the book.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use openvenue_types::*;
use rust_decimal::Decimal;

use crate::price_level::PriceLevel;

/// The order book for one (market, outcome) pair.
#[derive(Debug)]
pub struct OrderBook {
    pub instrument: Instrument,
    bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
    index: HashMap<OrderId, (OrderSide, Decimal)>,
}

/// Ordered copy of both sides of a book.
///
/// Bids are price-descending, asks price-ascending, each then by arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSnapshot {
    pub instrument: Instrument,
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
}

impl BookSnapshot {
    /// Aggregated `(price, remaining quantity)` per level for one side.
    #[must_use]
    pub fn depth(&self, side: OrderSide) -> Vec<(Decimal, Decimal)> {
        let orders = match side {
            OrderSide::Buy => &self.bids,
            OrderSide::Sell => &self.asks,
        };
        let mut levels: Vec<(Decimal, Decimal)> = Vec::new();
        for order in orders {
            match levels.last_mut() {
                Some((price, qty)) if *price == order.price => *qty += order.remaining(),
                _ => levels.push((order.price, order.remaining())),
            }
        }
        levels
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

impl OrderBook {
    #[must_use]
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    // =================================================================
    // Insertion
    // =================================================================

    /// Rest an order at its limit price behind existing orders at that price.
    pub fn insert_order(&mut self, order: Order) -> Result<()> {
        if self.index.contains_key(&order.id) {
            return Err(OpenvenueError::DuplicateOrder(order.id));
        }
        if order.status.is_terminal() || order.remaining() <= Decimal::ZERO {
            return Err(OpenvenueError::AlreadyTerminal {
                order_id: order.id,
                status: order.status,
            });
        }

        let price = order.price;
        self.index.insert(order.id, (order.side, price));

        match order.side {
            OrderSide::Buy => {
                self.bids
                    .entry(Reverse(price))
                    .or_insert_with(|| PriceLevel::new(price))
                    .push_back(order);
            }
            OrderSide::Sell => {
                self.asks
                    .entry(price)
                    .or_insert_with(|| PriceLevel::new(price))
                    .push_back(order);
            }
        }
        Ok(())
    }

    // =================================================================
    // Removal
    // =================================================================

    /// Remove an order by ID and return it. Status is left to the caller.
    pub fn cancel_order(&mut self, order_id: &OrderId) -> Result<Order> {
        let (side, price) = self
            .index
            .remove(order_id)
            .ok_or(OpenvenueError::OrderNotFound(*order_id))?;

        let order = match side {
            OrderSide::Buy => {
                let level = self
                    .bids
                    .get_mut(&Reverse(price))
                    .ok_or(OpenvenueError::OrderNotFound(*order_id))?;
                let order = level
                    .remove_order(order_id)
                    .ok_or(OpenvenueError::OrderNotFound(*order_id))?;
                if level.is_empty() {
                    self.bids.remove(&Reverse(price));
                }
                order
            }
            OrderSide::Sell => {
                let level = self
                    .asks
                    .get_mut(&price)
                    .ok_or(OpenvenueError::OrderNotFound(*order_id))?;
                let order = level
                    .remove_order(order_id)
                    .ok_or(OpenvenueError::OrderNotFound(*order_id))?;
                if level.is_empty() {
                    self.asks.remove(&price);
                }
                order
            }
        };

        Ok(order)
    }

    /// Fill `qty` of a resting order. A fully filled order leaves the book
    /// and is returned.
    pub fn fill_resting(
        &mut self,
        order_id: &OrderId,
        qty: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let order = self
            .get_mut(order_id)
            .ok_or(OpenvenueError::OrderNotFound(*order_id))?;
        order.record_fill(qty, at)?;
        if order.is_filled() {
            return self.cancel_order(order_id).map(Some);
        }
        Ok(None)
    }

    /// Remove every order whose expiry is at or before `now`.
    pub fn expire_before(&mut self, now: DateTime<Utc>) -> Vec<Order> {
        let mut expired = Vec::new();
        for level in self.bids.values_mut() {
            expired.extend(level.extract_if(|o| o.is_expired_at(now)));
        }
        for level in self.asks.values_mut() {
            expired.extend(level.extract_if(|o| o.is_expired_at(now)));
        }
        self.bids.retain(|_, level| !level.is_empty());
        self.asks.retain(|_, level| !level.is_empty());
        for order in &expired {
            self.index.remove(&order.id);
        }
        expired
    }

    /// Drain all orders in priority order (bids first).
    pub fn drain_all(&mut self) -> Vec<Order> {
        self.index.clear();
        let mut all = Vec::new();
        for level in self.bids.values_mut() {
            all.extend(level.orders.drain(..));
        }
        for level in self.asks.values_mut() {
            all.extend(level.orders.drain(..));
        }
        self.bids.clear();
        self.asks.clear();
        all
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        let (side, price) = self.index.get(order_id)?;
        match side {
            OrderSide::Buy => self.bids.get(&Reverse(*price))?.get(order_id),
            OrderSide::Sell => self.asks.get(price)?.get(order_id),
        }
    }

    fn get_mut(&mut self, order_id: &OrderId) -> Option<&mut Order> {
        let (side, price) = *self.index.get(order_id)?;
        match side {
            OrderSide::Buy => self.bids.get_mut(&Reverse(price))?.get_mut(order_id),
            OrderSide::Sell => self.asks.get_mut(&price)?.get_mut(order_id),
        }
    }

    /// Best (highest) bid price, or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next().map(|r| r.0)
    }

    /// Best (lowest) ask price, or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Spread = best_ask - best_bid. `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Mid price = (best_bid + best_ask) / 2. `None` if either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct bid price levels.
    #[must_use]
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    /// Number of distinct ask price levels.
    #[must_use]
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn contains_order(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    // =================================================================
    // Iteration
    // =================================================================

    /// Bid levels from best (highest) to worst.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values()
    }

    /// Ask levels from best (lowest) to worst.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    /// Levels an incoming order of `side` would trade against, best first.
    pub fn contra_levels(&self, side: OrderSide) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match side {
            OrderSide::Buy => Box::new(self.asks.values()),
            OrderSide::Sell => Box::new(self.bids.values()),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            instrument: self.instrument.clone(),
            bids: self
                .bid_levels()
                .flat_map(|l| l.orders.iter().cloned())
                .collect(),
            asks: self
                .ask_levels()
                .flat_map(|l| l.orders.iter().cloned())
                .collect(),
        }
    }
}
