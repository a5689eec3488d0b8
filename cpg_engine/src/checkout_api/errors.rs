use thiserror::Error;

use crate::traits::StorageError;

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("The cart has no items that can be priced")]
    EmptyCart,
    #[error("No shipping address is saved for user #{0}")]
    AddressMissing(i64),
    #[error("Cash-on-delivery orders must belong to a signed-in customer")]
    PayerRequired,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    /// Another order already holds the external transaction id. The order flow recovers from this by returning the
    /// existing order, so callers of the public API never see it.
    #[error("Transaction {0} already has an order")]
    StorageConflict(String),
    #[error("Storage is unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),
    #[error("Transaction {0} belongs to another account")]
    TransactionOwnedByAnotherUser(String),
}

impl From<StorageError> for CheckoutError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(key) => CheckoutError::StorageConflict(key),
            e => CheckoutError::DatabaseError(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        CheckoutError::DatabaseError(e.to_string())
    }
}
