//! A single price level in the order book.
//!
//! Orders at the same price are stored in FIFO order (time priority)
//! using a [`VecDeque`].

use std::collections::VecDeque;

use openvenue_types::{Order, OrderId};
use rust_decimal::Decimal;

/// All resting orders at one price, front = oldest = filled first.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Decimal,
    pub orders: VecDeque<Order>,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
        }
    }

    /// Add an order at the lowest time priority.
    pub fn push_back(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    pub fn pop_front(&mut self) -> Option<Order> {
        self.orders.pop_front()
    }

    #[must_use]
    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Total remaining (unfilled) quantity at this level.
    #[must_use]
    pub fn total_quantity(&self) -> Decimal {
        self.orders.iter().map(Order::remaining).sum()
    }

    #[must_use]
    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == *order_id)
    }

    pub fn get_mut(&mut self, order_id: &OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == *order_id)
    }

    /// Remove a specific order by ID, preserving the order of the rest.
    pub fn remove_order(&mut self, order_id: &OrderId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.id == *order_id)?;
        self.orders.remove(pos)
    }

    /// Remove every order matching `pred`, keeping FIFO order for the rest.
    pub fn extract_if(&mut self, mut pred: impl FnMut(&Order) -> bool) -> Vec<Order> {
        let mut kept = VecDeque::with_capacity(self.orders.len());
        let mut removed = Vec::new();
        for order in self.orders.drain(..) {
            if pred(&order) {
                removed.push(order);
            } else {
                kept.push_back(order);
            }
        }
        self.orders = kept;
        removed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }
}
