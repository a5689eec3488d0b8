//! Checkout payment engine
//!
//! This library holds the payment-reconciliation core of the checkout service. It takes gateway notifications that may
//! arrive more than once, in any order, and concurrently, and turns the customer's cart into exactly one order per
//! gateway transaction.
//!
//! The library is divided into these sections:
//! 1. Storage. The traits in [`mod@traits`] describe everything the core needs from a database, and
//!    [`SqliteDatabase`] implements them. Data types shared with callers live in [`mod@db_types`].
//! 2. The public API ([`mod@checkout_api`]): [`TransactionApi`] opens gateway transactions, and [`OrderFlowApi`]
//!    materializes orders idempotently.
//! 3. Helpers for the gateway protocol ([`mod@helpers`]): the [`TransactionAuthenticator`] that signs and verifies
//!    gateway digests, and transaction id generation.
//! 4. The [`RequestDeduplicator`], which suppresses double-submitted payment initiations.
//!
//! The engine also publishes an [`events::OrderCreatedEvent`] for every new order. Register a hook with
//! [`events::EventHooks`] to react to it.
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod checkout_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod request_dedup;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use checkout_api::{
    cart_pricer::{price_cart, unit_price, PricedCart},
    errors::CheckoutError,
    order_flow_api::{OrderFlowApi, PaymentContext},
    transaction_api::{PaymentRequest, SignedTransaction, TransactionApi},
};
pub use helpers::{DigestFields, DigestMismatch, InitiationFields, TransactionAuthenticator, VerificationFields};
pub use request_dedup::RequestDeduplicator;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CartManagement,
    CheckoutDatabase,
    CustomerDirectory,
    InsertOrderResult,
    OrderManagement,
    PendingTransactions,
    StorageError,
};
