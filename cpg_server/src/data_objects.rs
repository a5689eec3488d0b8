use std::{fmt::Display, sync::OnceLock};

use cpg_common::Money;
use cpg_engine::{db_types::Order, SignedTransaction};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{config::GatewayUrls, errors::ServerError, helpers::cached_regex};

static EMAIL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
static PHONE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

//-------------------------------------------   Payment initiation   ---------------------------------------------------
/// Storefronts send the amount either as a JSON number or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Number(serde_json::Number),
    Text(String),
}

impl AmountField {
    pub fn as_text(&self) -> String {
        match self {
            AmountField::Number(n) => n.to_string(),
            AmountField::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentInitiationRequest {
    pub amount: Option<AmountField>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A payment initiation that passed input validation. Every field is trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInitiation {
    pub amount: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl PaymentInitiationRequest {
    /// Checks run in a fixed order, and the first failure is reported: missing fields, then the amount, the email
    /// and finally the phone number.
    pub fn validate(self) -> Result<ValidatedInitiation, ServerError> {
        let amount = self.amount.map(|a| a.as_text()).filter(|s| !s.is_empty());
        let name = present(self.name);
        let email = present(self.email);
        let phone = present(self.phone);
        let (Some(amount), Some(name), Some(email), Some(phone)) = (&amount, &name, &email, &phone) else {
            let missing = [
                ("amount", amount.is_none()),
                ("name", name.is_none()),
                ("email", email.is_none()),
                ("phone", phone.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect::<Vec<_>>();
            return Err(ServerError::InvalidRequestBody(format!("Missing required fields: {}", missing.join(", "))));
        };
        match amount.parse::<Money>() {
            Ok(m) if m.is_positive() => {},
            _ => return Err(ServerError::InvalidRequestBody(format!("Invalid amount: {amount}"))),
        }
        if !pattern_matches(&EMAIL_PATTERN, r"^[^\s@]+@[^\s@]+\.[^\s@]+$", email)? {
            return Err(ServerError::InvalidRequestBody("Invalid email format".into()));
        }
        if !pattern_matches(&PHONE_PATTERN, r"^\d{10}$", phone)? {
            return Err(ServerError::InvalidRequestBody("Phone number must be 10 digits".into()));
        }
        Ok(ValidatedInitiation { amount: amount.clone(), name: name.clone(), email: email.clone(), phone: phone.clone() })
    }
}

fn pattern_matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> Result<bool, ServerError> {
    cached_regex(cell, pattern)
        .map(|re| re.is_match(value))
        .ok_or_else(|| ServerError::Unspecified(format!("Validation pattern {pattern} is unusable")))
}

/// Everything the storefront needs to build the auto-submitting form that posts the customer to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiationResponse {
    pub key: String,
    pub txnid: String,
    pub amount: String,
    pub productinfo: String,
    pub firstname: String,
    pub email: String,
    pub phone: String,
    pub hash: String,
    pub surl: String,
    pub furl: String,
    #[serde(rename = "frontendSuccessUrl")]
    pub frontend_success_url: String,
    #[serde(rename = "frontendFailUrl")]
    pub frontend_fail_url: String,
}

impl PaymentInitiationResponse {
    pub fn new(txn: SignedTransaction, urls: &GatewayUrls) -> Self {
        Self {
            key: txn.merchant_key,
            txnid: txn.txn_id.0,
            amount: txn.amount,
            productinfo: txn.product_info,
            firstname: txn.payer_name,
            email: txn.payer_email,
            phone: txn.payer_phone,
            hash: txn.hash,
            surl: urls.success_callback.clone(),
            furl: urls.failure_callback.clone(),
            frontend_success_url: urls.success_redirect.clone(),
            frontend_fail_url: urls.failure_redirect.clone(),
        }
    }
}

//-------------------------------------------     Gateway callbacks    -------------------------------------------------
/// The form the gateway posts to `surl`/`furl`. Every field is optional here so that a malformed post can still be
/// answered with a redirect. The gateway sends many more fields, which are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayCallbackForm {
    pub txnid: Option<String>,
    pub amount: Option<String>,
    pub productinfo: Option<String>,
    pub firstname: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub hash: Option<String>,
    pub key: Option<String>,
    pub mihpayid: Option<String>,
    pub bank_ref_num: Option<String>,
    pub error: Option<String>,
    #[serde(rename = "error_Message")]
    pub error_message: Option<String>,
}

/// The parameters the gateway appends when it sends the customer's browser back to us.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserRedirectQuery {
    pub txnid: Option<String>,
    pub status: Option<String>,
    pub mihpayid: Option<String>,
    pub bank_ref_num: Option<String>,
    pub error: Option<String>,
    #[serde(rename = "error_Message")]
    pub error_message: Option<String>,
}

//-------------------------------------------        Orders        -----------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub txnid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub order: Order,
}

impl OrderResponse {
    pub fn new(order: Order) -> Self {
        Self { success: true, message: None, order }
    }

    pub fn with_message<S: Display>(order: Order, message: S) -> Self {
        Self { success: true, message: Some(message.to_string()), order }
    }
}
