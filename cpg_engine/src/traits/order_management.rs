use crate::{
    db_types::{NewOrder, Order, TransactionId},
    traits::{InsertOrderResult, StorageError},
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// In a single atomic transaction:
    /// * inserts the order. If another order already carries the same external transaction id, the insert is a
    ///   no-op and the existing order is returned as [`InsertOrderResult::AlreadyExists`]. The check relies on the
    ///   storage uniqueness constraint, not on a prior read.
    /// * if (and only if) the order was inserted, belongs to a user and has items, clears that user's cart.
    async fn insert_order_and_clear_cart(&self, order: NewOrder) -> Result<InsertOrderResult, StorageError>;

    async fn fetch_order_by_txn_id(&self, txn_id: &TransactionId) -> Result<Option<Order>, StorageError>;

    async fn fetch_order_by_txn_id_for_user(
        &self,
        txn_id: &TransactionId,
        user_id: i64,
    ) -> Result<Option<Order>, StorageError>;

    /// Newest first.
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StorageError>;
}
