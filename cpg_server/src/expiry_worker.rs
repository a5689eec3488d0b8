use std::time::Duration;

use cpg_engine::{RequestDeduplicator, SqliteDatabase, TransactionApi};
use log::*;
use tokio::task::JoinHandle;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Starts the sweeper, which periodically forgets stale pending transactions and expired deduplication entries.
/// Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_sweeper(
    db: SqliteDatabase,
    dedup: RequestDeduplicator,
    pending_ttl: chrono::Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = TransactionApi::new(db);
        info!("🕰️ Pending transaction sweeper started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running pending transaction sweep");
            match api.purge_expired(pending_ttl).await {
                Ok(0) => {},
                Ok(n) => info!("🕰️ {n} stale pending transactions purged"),
                Err(e) => error!("🕰️ Error purging pending transactions: {e}"),
            }
            let evicted = dedup.evict_expired();
            if evicted > 0 {
                debug!("🕰️ {evicted} expired deduplication entries evicted");
            }
        }
    })
}
