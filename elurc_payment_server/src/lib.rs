//! # ELURC payment server
//! This crate hosts the HTTP server for the ELURC storefront payments. It is responsible for:
//! Answering payment status polls from the storefront checkout, which drives the payment monitor.
//! Letting shop admins issue refunds and move orders through their life cycle.
//! Sending payment confirmation emails via a webhook once an order is paid.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/payment/status/{order_id}`: The payment status of an order.
//! * `/api/admin/...`: Refund and order management routes. These require the admin token.

pub mod cli;
pub mod config;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

pub mod data_objects;
pub mod expiry_worker;

#[cfg(test)]
mod endpoint_tests;
