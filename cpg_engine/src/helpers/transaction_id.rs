use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::db_types::TransactionId;

const SUFFIX_LEN: usize = 7;

/// Generates a gateway transaction id of the form `txn{unix_millis}_{7 lowercase alphanumerics}`.
///
/// The gateway caps `txnid` at 25 characters. This format produces 24 until the year 2286.
pub fn new_transaction_id() -> TransactionId {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    TransactionId(format!("txn{}_{suffix}", Utc::now().timestamp_millis()))
}
