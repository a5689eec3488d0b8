use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewPendingTransaction, PendingTransaction, TransactionId},
    traits::StorageError,
};

#[allow(async_fn_in_trait)]
pub trait PendingTransactions {
    async fn insert_pending_transaction(&self, txn: NewPendingTransaction)
        -> Result<PendingTransaction, StorageError>;

    async fn fetch_pending_transaction(&self, txn_id: &TransactionId)
        -> Result<Option<PendingTransaction>, StorageError>;

    /// Deletes pending transactions created before `cutoff` and returns how many were removed.
    async fn purge_pending_transactions(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}
