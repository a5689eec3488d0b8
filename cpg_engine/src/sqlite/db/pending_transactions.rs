use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPendingTransaction, PendingTransaction, TransactionId},
    traits::StorageError,
};

pub async fn insert_pending_transaction(
    txn: NewPendingTransaction,
    conn: &mut SqliteConnection,
) -> Result<PendingTransaction, StorageError> {
    let pending = sqlx::query_as(
        r#"
        INSERT INTO pending_transactions (txn_id, amount, payer_name, payer_email, payer_phone, user_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(txn.txn_id.as_str())
    .bind(txn.amount)
    .bind(txn.payer_name)
    .bind(txn.payer_email)
    .bind(txn.payer_phone)
    .bind(txn.user_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(pending)
}

pub async fn fetch_pending_transaction(
    txn_id: &TransactionId,
    conn: &mut SqliteConnection,
) -> Result<Option<PendingTransaction>, StorageError> {
    let pending = sqlx::query_as("SELECT * FROM pending_transactions WHERE txn_id = $1")
        .bind(txn_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(pending)
}

pub async fn purge_pending_transactions(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM pending_transactions WHERE julianday(created_at) < julianday($1)")
        .bind(cutoff)
        .execute(conn)
        .await?;
    let n = result.rows_affected();
    if n > 0 {
        debug!("🗃️ Purged {n} pending transactions created before {cutoff}");
    }
    Ok(n)
}
