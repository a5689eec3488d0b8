use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{Money, NewOrder, Order, OrderItem, OrderStatusType, PaymentMethod, ShippingAddress, TransactionId},
    traits::StorageError,
};

/// The raw row. Items and the address snapshot are stored as JSON text; status and payment method as lowercase text.
#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: i64,
    user_id: Option<i64>,
    items: String,
    total_amount: Money,
    currency: String,
    payment_method: String,
    status: String,
    external_txn_id: Option<String>,
    external_payment_ref: Option<String>,
    shipping_address: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StorageError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: String| StorageError::CorruptRecord(format!("order {} {field}: {e}", row.id));
        let items = serde_json::from_str::<Vec<OrderItem>>(&row.items).map_err(|e| corrupt("items", e.to_string()))?;
        let shipping_address = row
            .shipping_address
            .as_deref()
            .map(serde_json::from_str::<ShippingAddress>)
            .transpose()
            .map_err(|e| corrupt("shipping_address", e.to_string()))?;
        let payment_method =
            row.payment_method.parse::<PaymentMethod>().map_err(|e| corrupt("payment_method", format!("{e}")))?;
        let status = row.status.parse::<OrderStatusType>().map_err(|e| corrupt("status", format!("{e}")))?;
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            items,
            total_amount: row.total_amount,
            currency: row.currency,
            payment_method,
            status,
            external_txn_id: row.external_txn_id.map(TransactionId::from),
            external_payment_ref: row.external_payment_ref,
            shipping_address,
            created_at: row.created_at,
        })
    }
}

fn to_order(row: Option<OrderRow>) -> Result<Option<Order>, StorageError> {
    row.map(Order::try_from).transpose()
}

/// Inserts the order unless another order already holds the same `external_txn_id`.
///
/// The uniqueness check is performed by the database (`ON CONFLICT DO NOTHING`), so two concurrent callers cannot both
/// succeed. Returns `None` when the insert was skipped because of a conflict.
///
/// This is not atomic with respect to anything else you do on `conn`. Embed it in a transaction if you need that.
pub async fn insert_order_if_new(order: NewOrder, conn: &mut SqliteConnection) -> Result<Option<Order>, StorageError> {
    let items = serde_json::to_string(&order.items).map_err(|e| StorageError::CorruptRecord(e.to_string()))?;
    let address = order
        .shipping_address
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StorageError::CorruptRecord(e.to_string()))?;
    let row: Option<OrderRow> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                user_id,
                items,
                total_amount,
                currency,
                payment_method,
                status,
                external_txn_id,
                external_payment_ref,
                shipping_address,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (external_txn_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.user_id)
    .bind(items)
    .bind(order.total_amount.value())
    .bind(order.currency)
    .bind(order.payment_method.to_string())
    .bind(order.status.to_string())
    .bind(order.external_txn_id.as_ref().map(|t| t.as_str().to_string()))
    .bind(order.external_payment_ref)
    .bind(address)
    .bind(order.created_at)
    .fetch_optional(conn)
    .await?;
    match &row {
        Some(r) => debug!("🗃️ Order #{} inserted for user {:?}", r.id, r.user_id),
        None => trace!("🗃️ Order insert skipped. Transaction {:?} already has an order", order.external_txn_id),
    }
    to_order(row)
}

pub async fn fetch_order_by_txn_id(
    txn_id: &TransactionId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as("SELECT * FROM orders WHERE external_txn_id = $1")
        .bind(txn_id.as_str())
        .fetch_optional(conn)
        .await?;
    to_order(row)
}

pub async fn fetch_order_by_txn_id_for_user(
    txn_id: &TransactionId,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as("SELECT * FROM orders WHERE external_txn_id = $1 AND user_id = $2")
        .bind(txn_id.as_str())
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    to_order(row)
}

pub async fn fetch_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, StorageError> {
    let rows: Vec<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    rows.into_iter().map(Order::try_from).collect()
}

pub async fn count_orders_for_txn_id(txn_id: &TransactionId, conn: &mut SqliteConnection) -> Result<i64, StorageError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE external_txn_id = $1")
        .bind(txn_id.as_str())
        .fetch_one(conn)
        .await?;
    Ok(count)
}
