//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! Every interaction is a plain function that accepts a `&mut SqliteConnection`. Callers can pass a pooled connection,
//! or `&mut *tx` for an open transaction when several calls must commit together.
use std::{str::FromStr, time::Duration};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod carts;
pub mod customers;
pub mod orders;
pub mod pending_transactions;

/// Opens a connection pool. Writers wait up to `acquire_timeout` for the database lock rather than failing at once,
/// and WAL journaling lets readers carry on while an order is being written.
pub async fn new_pool(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(acquire_timeout)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await?;
    Ok(pool)
}
