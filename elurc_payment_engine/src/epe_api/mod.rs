//! # ELURC payment engine public API
//!
//! The APIs here are what the server (or any other front end) calls. Each one is created by supplying a storage
//! backend that implements the traits it needs, and, where chain access is required, a [`crate::solana::SolanaRpc`]
//! implementation.
//!
//! * [`order_flow_api`] creates orders and applies admin status changes and discrepancy resolutions, enforcing the
//!   order state machine.
//! * [`refund_api`] runs the full refund flow, from amount validation through to the on-chain transfer and the
//!   resulting bookkeeping.
//!
//! ```rust,ignore
//! use elurc_payment_engine::{OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, producers);
//! let order = api.modify_status(&order_id, OrderStatusType::Processing, ChangedBy::Admin, None).await?;
//! ```
pub mod errors;
pub mod order_flow_api;
pub mod refund_api;
pub mod refund_objects;
