use thiserror::Error;

use crate::traits::{CartManagement, CustomerDirectory, OrderManagement, PendingTransactions};

/// The complete set of storage behaviour the checkout flow relies on.
pub trait CheckoutDatabase:
    Clone + CartManagement + CustomerDirectory + OrderManagement + PendingTransactions {
    /// The URL of the database
    fn url(&self) -> &str;
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("A stored record could not be interpreted. {0}")]
    CorruptRecord(String),
    /// A uniqueness constraint rejected the write, and the record holding the key could not be read back.
    #[error("Another record already holds {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}
