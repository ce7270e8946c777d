//! Engine-wide index from order id to the market holding the order.
//!
//! Striped by order id so placements in different markets rarely meet on
//! the same lock. An id is claimed before its market accepts the order, so
//! no two markets can hold orders under one id.

use std::collections::HashMap;

use openvenue_types::{MarketId, OrderId};
use parking_lot::RwLock;

const STRIPES: usize = 16;

pub struct RouteIndex {
    stripes: Vec<RwLock<HashMap<OrderId, MarketId>>>,
}

impl RouteIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn stripe(&self, id: &OrderId) -> &RwLock<HashMap<OrderId, MarketId>> {
        // Both v7 and derived ids end in pseudo-random bits.
        &self.stripes[usize::from(id.0.as_bytes()[15]) % STRIPES]
    }

    #[must_use]
    pub fn get(&self, id: &OrderId) -> Option<MarketId> {
        self.stripe(id).read().get(id).cloned()
    }

    /// Route `id` to `market` unless it is already routed. Returns whether
    /// the claim was taken.
    pub fn claim(&self, id: OrderId, market: &MarketId) -> bool {
        let mut stripe = self.stripe(&id).write();
        if stripe.contains_key(&id) {
            return false;
        }
        stripe.insert(id, market.clone());
        true
    }

    /// Drop a claim whose order was never accepted.
    pub fn release(&self, id: &OrderId) {
        self.stripe(id).write().remove(id);
    }

    /// Drop every route into `market`. Returns how many were removed.
    pub fn evict_market(&self, market: &MarketId) -> usize {
        self.stripes
            .iter()
            .map(|stripe| {
                let mut stripe = stripe.write();
                let before = stripe.len();
                stripe.retain(|_, m| *m != *market);
                before - stripe.len()
            })
            .sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stripes.iter().map(|s| s.read().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RouteIndex {
    fn default() -> Self {
        Self::new()
    }
}
