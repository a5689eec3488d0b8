//! # Checkout payment gateway server
//! This crate hosts the HTTP front end of the checkout flow. It is responsible for:
//! * Opening signed transactions with the payment gateway on behalf of the storefront.
//! * Receiving the gateway's signed callbacks, turning successful payments into orders, and redirecting the customer
//!   back to the storefront.
//! * Cash-on-delivery checkout and the customer's order history.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `POST /api/payment/gateway/create`: Opens a gateway transaction.
//! * `POST /api/payment/gateway/callback`: The gateway's signed server-to-server callback.
//! * `GET /api/payment/gateway/callback`: The customer's browser returning from the gateway.
//! * `POST /api/payment/verify`: Claims a gateway transaction for the signed-in customer.
//! * `POST /api/payment/cod/create`: Places a cash-on-delivery order.
//! * `GET /api/orders`: The signed-in customer's orders.

pub mod auth;
pub mod callbacks;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
