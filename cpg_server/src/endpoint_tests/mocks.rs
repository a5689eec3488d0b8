use chrono::{DateTime, Utc};
use cpg_engine::{
    db_types::{
        CartLine,
        Customer,
        NewOrder,
        NewPendingTransaction,
        Order,
        PendingTransaction,
        ProductPricing,
        ShippingAddress,
        TransactionId,
    },
    traits::{
        CartManagement,
        CheckoutDatabase,
        CustomerDirectory,
        InsertOrderResult,
        OrderManagement,
        PendingTransactions,
        StorageError,
    },
};
use mockall::mock;

mock! {
    pub CheckoutBackend {}
    impl Clone for CheckoutBackend {
        fn clone(&self) -> Self;
    }
    impl CheckoutDatabase for CheckoutBackend {
        fn url(&self) -> &str;
    }
    impl CartManagement for CheckoutBackend {
        async fn fetch_cart(&self, user_id: i64) -> Result<Vec<CartLine>, StorageError>;
        async fn fetch_product_pricing(&self, product_ids: &[i64]) -> Result<Vec<ProductPricing>, StorageError>;
    }
    impl CustomerDirectory for CheckoutBackend {
        async fn fetch_customer(&self, user_id: i64) -> Result<Option<Customer>, StorageError>;
        async fn fetch_customers_by_email(&self, email: &str) -> Result<Vec<Customer>, StorageError>;
        async fn fetch_shipping_address(&self, user_id: i64) -> Result<Option<ShippingAddress>, StorageError>;
    }
    impl OrderManagement for CheckoutBackend {
        async fn insert_order_and_clear_cart(&self, order: NewOrder) -> Result<InsertOrderResult, StorageError>;
        async fn fetch_order_by_txn_id(&self, txn_id: &TransactionId) -> Result<Option<Order>, StorageError>;
        async fn fetch_order_by_txn_id_for_user(&self, txn_id: &TransactionId, user_id: i64) -> Result<Option<Order>, StorageError>;
        async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StorageError>;
    }
    impl PendingTransactions for CheckoutBackend {
        async fn insert_pending_transaction(&self, txn: NewPendingTransaction) -> Result<PendingTransaction, StorageError>;
        async fn fetch_pending_transaction(&self, txn_id: &TransactionId) -> Result<Option<PendingTransaction>, StorageError>;
        async fn purge_pending_transactions(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
    }
}
