//! `SqliteDatabase` is the concrete storage backend of the checkout engine.
//!
//! It implements all the traits defined in the [`crate::traits`] module, composing the free functions in
//! [`super::db`] and opening transactions where several statements must commit together.
use std::{fmt::Debug, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{carts, customers, new_pool, orders, pending_transactions};
use crate::{
    db_types::{
        CartLine,
        Customer,
        Money,
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

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        Self::new_with_timeout(url, max_connections, DEFAULT_ACQUIRE_TIMEOUT).await
    }

    /// `acquire_timeout` bounds how long a caller waits for a pooled connection before giving up.
    pub async fn new_with_timeout(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections, acquire_timeout).await?;
        debug!("🗃️ Connected to {url} with up to {max_connections} connections");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    // -------------------------- Catalogue and address book maintenance --------------------------
    // The checkout flow only reads these tables. These helpers are for seeding and administration.

    pub async fn add_customer(&self, name: &str, email: &str, phone: Option<&str>) -> Result<Customer, StorageError> {
        let mut conn = self.pool.acquire().await?;
        customers::insert_customer(name, email, phone, &mut conn).await
    }

    pub async fn add_product(
        &self,
        name: &str,
        price: Option<Money>,
        mrp: Money,
        discount_percent: i64,
    ) -> Result<i64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        carts::insert_product(name, price, mrp, discount_percent, &mut conn).await
    }

    pub async fn add_to_cart(&self, user_id: i64, line: CartLine) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        carts::add_to_cart(user_id, line, &mut conn).await
    }

    pub async fn save_shipping_address(&self, user_id: i64, address: &ShippingAddress) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        customers::upsert_shipping_address(user_id, address, &mut conn).await
    }

    pub async fn count_orders_for_txn_id(&self, txn_id: &TransactionId) -> Result<i64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::count_orders_for_txn_id(txn_id, &mut conn).await
    }
}

impl CheckoutDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl CartManagement for SqliteDatabase {
    async fn fetch_cart(&self, user_id: i64) -> Result<Vec<CartLine>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        carts::fetch_cart(user_id, &mut conn).await
    }

    async fn fetch_product_pricing(&self, product_ids: &[i64]) -> Result<Vec<ProductPricing>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        carts::fetch_product_pricing(product_ids, &mut conn).await
    }
}

impl CustomerDirectory for SqliteDatabase {
    async fn fetch_customer(&self, user_id: i64) -> Result<Option<Customer>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        customers::fetch_customer(user_id, &mut conn).await
    }

    async fn fetch_customers_by_email(&self, email: &str) -> Result<Vec<Customer>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        customers::fetch_customers_by_email(email, &mut conn).await
    }

    async fn fetch_shipping_address(&self, user_id: i64) -> Result<Option<ShippingAddress>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        customers::fetch_shipping_address(user_id, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order_and_clear_cart(&self, order: NewOrder) -> Result<InsertOrderResult, StorageError> {
        let txn_id = order.external_txn_id.clone();
        let mut tx = self.pool.begin().await?;
        match orders::insert_order_if_new(order, &mut tx).await? {
            Some(inserted) => {
                // Orders recorded without items did not come from the cart
                if let (Some(user_id), false) = (inserted.user_id, inserted.items.is_empty()) {
                    carts::clear_cart(user_id, &mut tx).await?;
                }
                tx.commit().await?;
                debug!("🗃️ Order #{} committed", inserted.id);
                Ok(InsertOrderResult::Inserted(inserted))
            },
            None => {
                tx.rollback().await?;
                // Only orders that carry an external transaction id can conflict.
                let txn_id = txn_id.ok_or_else(|| {
                    StorageError::DatabaseError("Order insert was skipped without a transaction id".to_string())
                })?;
                let mut conn = self.pool.acquire().await?;
                let existing = orders::fetch_order_by_txn_id(&txn_id, &mut conn)
                    .await?
                    .ok_or_else(|| StorageError::Conflict(txn_id.to_string()))?;
                debug!("🗃️ Transaction {txn_id} already materialized as order #{}", existing.id);
                Ok(InsertOrderResult::AlreadyExists(existing))
            },
        }
    }

    async fn fetch_order_by_txn_id(&self, txn_id: &TransactionId) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_txn_id(txn_id, &mut conn).await
    }

    async fn fetch_order_by_txn_id_for_user(
        &self,
        txn_id: &TransactionId,
        user_id: i64,
    ) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_txn_id_for_user(txn_id, user_id, &mut conn).await
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_user(user_id, &mut conn).await
    }
}

impl PendingTransactions for SqliteDatabase {
    async fn insert_pending_transaction(
        &self,
        txn: NewPendingTransaction,
    ) -> Result<PendingTransaction, StorageError> {
        let mut conn = self.pool.acquire().await?;
        pending_transactions::insert_pending_transaction(txn, &mut conn).await
    }

    async fn fetch_pending_transaction(
        &self,
        txn_id: &TransactionId,
    ) -> Result<Option<PendingTransaction>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        pending_transactions::fetch_pending_transaction(txn_id, &mut conn).await
    }

    async fn purge_pending_transactions(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        pending_transactions::purge_pending_transactions(cutoff, &mut conn).await
    }
}
