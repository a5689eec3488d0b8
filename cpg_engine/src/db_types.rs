use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use cpg_common::{Money, INR_CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// Cash-on-delivery orders wait here until the courier collects payment.
    Pending,
    /// The gateway confirmed the payment.
    Paid,
    Failed,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Paid => write!(f, "paid"),
            OrderStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError::new("order status", s)),
        }
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "gateway")]
    Gateway,
    #[serde(rename = "cod")]
    CashOnDelivery,
}

impl PaymentMethod {
    /// Gateway payments are verified before an order exists, so they start out paid. COD is collected later.
    pub fn initial_status(&self) -> OrderStatusType {
        match self {
            PaymentMethod::Gateway => OrderStatusType::Paid,
            PaymentMethod::CashOnDelivery => OrderStatusType::Pending,
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Gateway => write!(f, "gateway"),
            PaymentMethod::CashOnDelivery => write!(f, "cod"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gateway" => Ok(Self::Gateway),
            "cod" => Ok(Self::CashOnDelivery),
            s => Err(ConversionError::new("payment method", s)),
        }
    }
}

//--------------------------------------    TransactionId    ---------------------------------------------------------
/// The gateway transaction id (`txnid`). Generated here at initiation and echoed back by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

//--------------------------------------       Customer      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

//--------------------------------------   ShippingAddress   ---------------------------------------------------------
/// Snapshot of the address book entry, copied into the order at materialization time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub mobile_number: String,
    pub pincode: String,
    pub locality: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub landmark: Option<String>,
    pub alternate_phone: Option<String>,
    pub address_type: Option<String>,
}

//--------------------------------------  Cart and products  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductPricing {
    pub product_id: i64,
    pub name: String,
    /// An explicit selling price. When set it overrides the MRP/discount calculation.
    pub price: Option<Money>,
    pub mrp: Money,
    pub discount_percent: i64,
}

impl ProductPricing {
    pub fn with_mrp<S: Into<String>>(product_id: i64, name: S, mrp: Money, discount_percent: i64) -> Self {
        Self { product_id, name: name.into(), price: None, mrp, discount_percent }
    }

    pub fn with_price<S: Into<String>>(product_id: i64, name: S, price: Money) -> Self {
        Self { product_id, name: name.into(), price: Some(price), mrp: price, discount_percent: 0 }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: Option<i64>,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatusType,
    pub external_txn_id: Option<TransactionId>,
    pub external_payment_ref: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// A paid order whose payer could not be matched to an account. These need manual reconciliation.
    pub fn is_unattributed(&self) -> bool {
        self.user_id.is_none()
    }

    /// Unattributed orders, and gateway payments recorded without any items.
    pub fn needs_reconciliation(&self) -> bool {
        self.is_unattributed() || (self.payment_method == PaymentMethod::Gateway && self.items.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: Option<i64>,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatusType,
    pub external_txn_id: Option<TransactionId>,
    pub external_payment_ref: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(user_id: i64, items: Vec<OrderItem>, total_amount: Money, payment_method: PaymentMethod) -> Self {
        Self {
            user_id: Some(user_id),
            items,
            total_amount,
            currency: INR_CURRENCY_CODE.to_string(),
            payment_method,
            status: payment_method.initial_status(),
            external_txn_id: None,
            external_payment_ref: None,
            shipping_address: None,
            created_at: Utc::now(),
        }
    }

    /// A verified gateway payment with no priced cart behind it, either because nobody could be matched to the payment
    /// or because the payer's cart was empty. The verified amount is recorded as the total.
    pub fn for_verified_amount(
        user_id: Option<i64>,
        txn_id: TransactionId,
        payment_ref: Option<String>,
        amount: Money,
    ) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            total_amount: amount,
            currency: INR_CURRENCY_CODE.to_string(),
            payment_method: PaymentMethod::Gateway,
            status: OrderStatusType::Paid,
            external_txn_id: Some(txn_id),
            external_payment_ref: payment_ref,
            shipping_address: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_transaction(mut self, txn_id: TransactionId, payment_ref: Option<String>) -> Self {
        self.external_txn_id = Some(txn_id);
        self.external_payment_ref = payment_ref;
        self
    }

    pub fn with_shipping_address(mut self, address: ShippingAddress) -> Self {
        self.shipping_address = Some(address);
        self
    }
}

//--------------------------------------  PendingTransaction ---------------------------------------------------------
/// Record of a signed initiation, kept so that callbacks can be attributed to the account that started them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingTransaction {
    pub txn_id: TransactionId,
    /// The amount exactly as it was signed.
    pub amount: String,
    pub payer_name: String,
    pub payer_email: String,
    pub payer_phone: String,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPendingTransaction {
    pub txn_id: TransactionId,
    pub amount: String,
    pub payer_name: String,
    pub payer_email: String,
    pub payer_phone: String,
    pub user_id: Option<i64>,
}
