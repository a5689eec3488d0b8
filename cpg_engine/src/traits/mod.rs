//! # Storage contracts
//!
//! The checkout core never talks to a database directly. Everything it needs from storage is expressed in the
//! traits below, and a backend (see [`crate::SqliteDatabase`]) implements them.
//!
//! * [`CartManagement`] reads a customer's cart and the current pricing for the products in it.
//! * [`CustomerDirectory`] resolves customers by id or email, and fetches their saved shipping address.
//! * [`OrderManagement`] persists orders. The insert is atomic and treats the external transaction id as unique, so
//!   that racing deliveries of the same gateway callback can never create two orders.
//! * [`PendingTransactions`] remembers which account initiated each gateway transaction.
//! * [`CheckoutDatabase`] bundles the above.
mod cart_management;
mod checkout_database;
mod customer_directory;
mod data_objects;
mod order_management;
mod pending_transactions;

pub use cart_management::CartManagement;
pub use checkout_database::{CheckoutDatabase, StorageError};
pub use customer_directory::CustomerDirectory;
pub use data_objects::InsertOrderResult;
pub use order_management::OrderManagement;
pub use pending_transactions::PendingTransactions;
