use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// Published exactly once for every order that is freshly inserted. Replays of an existing order do not publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }

    /// Paid orders that could not be tied to an account or a cart need someone to match them up by hand.
    pub fn needs_reconciliation(&self) -> bool {
        self.order.needs_reconciliation()
    }
}
