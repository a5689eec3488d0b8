use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// Outcome of an order insert keyed on the external transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOrderResult {
    /// The order was written and, for attributed orders, the cart was cleared in the same transaction.
    Inserted(Order),
    /// Another order already holds this external transaction id. Nothing was written.
    AlreadyExists(Order),
}

impl InsertOrderResult {
    pub fn order(&self) -> &Order {
        match self {
            InsertOrderResult::Inserted(o) | InsertOrderResult::AlreadyExists(o) => o,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            InsertOrderResult::Inserted(o) | InsertOrderResult::AlreadyExists(o) => o,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOrderResult::Inserted(_))
    }
}
