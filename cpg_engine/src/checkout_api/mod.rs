//! # Checkout API
//!
//! * [`transaction_api`] opens gateway transactions: it allocates the transaction id, signs the fields the gateway will
//!   check, and records who initiated the payment.
//! * [`order_flow_api`] materializes carts into orders, exactly once per gateway transaction.
//! * [`cart_pricer`] derives order lines and totals from the catalogue.
//!
//! Each API is created from a storage backend implementing the traits it needs:
//!
//! ```rust,ignore
//! use cpg_engine::{events::EventProducers, OrderFlowApi, PaymentContext, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/cpg.db", 5).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let order = api.materialize(Some(user_id), PaymentContext::CashOnDelivery).await?;
//! ```
pub mod cart_pricer;
pub mod errors;
pub mod order_flow_api;
pub mod transaction_api;
