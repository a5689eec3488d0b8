//! # Gateway callbacks
//!
//! The gateway reports the outcome of a payment twice:
//!
//! * a server-to-server form post to `surl`/`furl`, signed with the merchant salt, and
//! * a browser redirect carrying the same status, which is not signed at all.
//!
//! Only the signed post may create an order. Both paths end the same way: the customer's browser is redirected to
//! the storefront's success or failure page with `txnid`, `status` and either the gateway references or an error
//! reason as query parameters. Nothing on these paths ever answers with an error status, because the customer is
//! looking at the response.
use actix_web::{http::header::LOCATION, HttpResponse};
use cpg_engine::{
    db_types::TransactionId,
    CheckoutDatabase,
    OrderFlowApi,
    PaymentContext,
    TransactionAuthenticator,
    VerificationFields,
};
use log::*;
use url::form_urlencoded;

use crate::{
    config::GatewayUrls,
    data_objects::{BrowserRedirectQuery, GatewayCallbackForm},
};

pub const GATEWAY_SUCCESS: &str = "success";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Success { txn_id: String, payment_id: Option<String>, bank_ref: Option<String> },
    Failure { txn_id: String, status: String, reason: String },
}

impl CallbackOutcome {
    pub fn failure<S: Into<String>>(txn_id: Option<&str>, status: Option<&str>, reason: S) -> Self {
        Self::Failure {
            txn_id: txn_id.unwrap_or_default().to_string(),
            status: status.filter(|s| !s.is_empty()).unwrap_or("failed").to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallbackOutcome::Success { .. })
    }

    /// The storefront page and query string the customer should land on.
    pub fn redirect_url(&self, urls: &GatewayUrls) -> String {
        match self {
            CallbackOutcome::Success { txn_id, payment_id, bank_ref } => {
                let mut params = vec![("txnid", txn_id.as_str()), ("status", GATEWAY_SUCCESS)];
                if let Some(id) = payment_id {
                    params.push(("mihpayid", id.as_str()));
                }
                if let Some(r) = bank_ref {
                    params.push(("bank_ref_num", r.as_str()));
                }
                with_query(&urls.success_redirect, &params)
            },
            CallbackOutcome::Failure { txn_id, status, reason } => with_query(&urls.failure_redirect, &[
                ("txnid", txn_id.as_str()),
                ("status", status.as_str()),
                ("error", reason.as_str()),
            ]),
        }
    }

    pub fn into_response(self, urls: &GatewayUrls) -> HttpResponse {
        let location = self.redirect_url(urls);
        HttpResponse::Found().insert_header((LOCATION, location)).finish()
    }
}

fn with_query(base: &str, params: &[(&str, &str)]) -> String {
    let query = form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

fn failure_reason(error_message: Option<&str>, error: Option<&str>) -> String {
    error_message
        .or(error)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Payment failed")
        .to_string()
}

/// Handles the signed server-to-server callback. An order is only created once the digest checks out and the
/// gateway reports success.
pub async fn process_server_callback<B: CheckoutDatabase>(
    form: GatewayCallbackForm,
    authenticator: Option<&TransactionAuthenticator>,
    api: &OrderFlowApi<B>,
) -> CallbackOutcome {
    let txn_hint = form.txnid.as_deref();
    let Some(authenticator) = authenticator else {
        error!("🔄️ Gateway callback received, but the gateway credentials are not configured");
        return CallbackOutcome::failure(txn_hint, form.status.as_deref(), "Server configuration error");
    };
    let required = (
        form.txnid.as_deref(),
        form.amount.as_deref(),
        form.productinfo.as_deref(),
        form.firstname.as_deref(),
        form.email.as_deref(),
        form.status.as_deref(),
        form.hash.as_deref(),
    );
    let (Some(txn_id), Some(amount), Some(product_info), Some(payer_name), Some(payer_email), Some(status), Some(hash)) =
        required
    else {
        warn!("🔄️ Gateway callback is missing required fields. {form:?}");
        return CallbackOutcome::failure(txn_hint, form.status.as_deref(), "Missing required fields");
    };
    let fields = VerificationFields { txn_id, amount, product_info, payer_name, payer_email, status };
    if authenticator.verify(&fields.into(), hash).is_err() {
        warn!("🔄️ Rejecting gateway callback for {txn_id}. The digest does not match.");
        return CallbackOutcome::failure(Some(txn_id), Some(status), "Invalid hash verification");
    }
    if status != GATEWAY_SUCCESS {
        let reason = failure_reason(form.error_message.as_deref(), form.error.as_deref());
        info!("🔄️ Gateway reports transaction {txn_id} as {status}: {reason}");
        return CallbackOutcome::failure(Some(txn_id), Some(status), reason);
    }
    let txn = TransactionId::from(txn_id);
    let payment = PaymentContext::gateway(txn.clone(), form.mihpayid.clone(), amount);
    let payer = match api.resolve_payer(&txn, payer_email).await {
        Ok(payer) => payer,
        Err(e) => {
            error!("🔄️ Could not resolve the payer for {txn_id}. {e}");
            return CallbackOutcome::failure(Some(txn_id), Some(status), "Order could not be recorded");
        },
    };
    match api.materialize(payer, payment).await {
        Ok(order) => {
            info!("🔄️ Transaction {txn_id} is recorded as order #{}", order.id);
            CallbackOutcome::Success {
                txn_id: txn_id.to_string(),
                payment_id: form.mihpayid,
                bank_ref: form.bank_ref_num,
            }
        },
        Err(e) => {
            error!("🔄️ Payment {txn_id} succeeded, but no order could be created. {e}");
            CallbackOutcome::failure(Some(txn_id), Some(status), format!("Order could not be created: {e}"))
        },
    }
}

/// Classifies the unsigned browser redirect. This never touches storage.
pub fn classify_browser_redirect(query: &BrowserRedirectQuery) -> CallbackOutcome {
    let txn_id = query.txnid.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let status = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
    match (txn_id, status) {
        (Some(txn_id), Some(GATEWAY_SUCCESS)) => CallbackOutcome::Success {
            txn_id: txn_id.to_string(),
            payment_id: query.mihpayid.clone(),
            bank_ref: query.bank_ref_num.clone(),
        },
        (Some(txn_id), Some(status)) => CallbackOutcome::failure(
            Some(txn_id),
            Some(status),
            failure_reason(query.error_message.as_deref(), query.error.as_deref()),
        ),
        (txn_id, _) => CallbackOutcome::failure(txn_id, None, "Invalid callback data"),
    }
}
