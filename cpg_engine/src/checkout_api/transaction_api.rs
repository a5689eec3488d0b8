use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    checkout_api::errors::CheckoutError,
    db_types::{Money, NewPendingTransaction, PendingTransaction, TransactionId},
    helpers::{new_transaction_id, InitiationFields, TransactionAuthenticator},
    traits::PendingTransactions,
};

/// What the customer asked to pay. Values are expected to be validated already; they are trimmed here and then used
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: String,
    pub payer_name: String,
    pub payer_email: String,
    pub payer_phone: String,
    pub product_info: String,
    /// The signed-in initiator, if any.
    pub user_id: Option<i64>,
}

/// Everything the browser needs to post the customer to the gateway. Each field is exactly what was signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub merchant_key: String,
    pub txn_id: TransactionId,
    pub amount: String,
    pub product_info: String,
    pub payer_name: String,
    pub payer_email: String,
    pub payer_phone: String,
    pub hash: String,
}

/// Opens gateway transactions and keeps the record of who opened them.
pub struct TransactionApi<B> {
    db: B,
}

impl<B> Debug for TransactionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransactionApi")
    }
}

impl<B> TransactionApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> TransactionApi<B>
where B: PendingTransactions
{
    /// Allocates a transaction id, signs the initiation fields and remembers the initiator so that the gateway
    /// callback can later be attributed to them.
    pub async fn initiate(
        &self,
        authenticator: &TransactionAuthenticator,
        request: PaymentRequest,
    ) -> Result<SignedTransaction, CheckoutError> {
        let amount = request.amount.trim().to_string();
        let parsed = amount.parse::<Money>().map_err(|e| CheckoutError::InvalidAmount(e.to_string()))?;
        if !parsed.is_positive() {
            return Err(CheckoutError::InvalidAmount(format!("{amount} is not a positive amount")));
        }
        let txn_id = new_transaction_id();
        let payer_name = request.payer_name.trim().to_string();
        let payer_email = request.payer_email.trim().to_string();
        let product_info = request.product_info.trim().to_string();
        let fields = InitiationFields {
            txn_id: txn_id.as_str(),
            amount: &amount,
            product_info: &product_info,
            payer_name: &payer_name,
            payer_email: &payer_email,
        };
        let hash = authenticator.sign(&fields.into());
        let pending = NewPendingTransaction {
            txn_id: txn_id.clone(),
            amount: amount.clone(),
            payer_name: payer_name.clone(),
            payer_email: payer_email.clone(),
            payer_phone: request.payer_phone.trim().to_string(),
            user_id: request.user_id,
        };
        let pending = self.db.insert_pending_transaction(pending).await?;
        info!(
            "🔄️ Transaction {txn_id} initiated for {amount} by {}",
            request.user_id.map(|id| format!("user #{id}")).unwrap_or_else(|| "a guest".to_string())
        );
        Ok(SignedTransaction {
            merchant_key: authenticator.merchant_key().to_string(),
            txn_id,
            amount,
            product_info,
            payer_name,
            payer_email,
            payer_phone: pending.payer_phone,
            hash,
        })
    }

    pub async fn pending_transaction(&self, txn_id: &TransactionId) -> Result<Option<PendingTransaction>, CheckoutError> {
        Ok(self.db.fetch_pending_transaction(txn_id).await?)
    }

    /// Forgets transactions initiated more than `ttl` ago. Returns the number removed.
    pub async fn purge_expired(&self, ttl: Duration) -> Result<u64, CheckoutError> {
        let cutoff = Utc::now() - ttl;
        let purged = self.db.purge_pending_transactions(cutoff).await?;
        if purged > 0 {
            debug!("🔄️ Purged {purged} pending transactions older than {cutoff}");
        }
        Ok(purged)
    }
}
