//! ELURC Payment Engine
//!
//! The engine reconciles storefront orders against SPL token transfers on Solana, and sends refunds when a payment
//! needs to be (partly) returned. It is independent of any HTTP framework.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend, [`SqliteDatabase`]). The flows never talk to the database
//!    directly; they are generic over the storage traits. The data types are defined in [`mod@db_types`].
//! 2. Chain access ([`mod@solana`]). Address derivation, transaction building and signing, and the [`SolanaRpc`]
//!    trait that every chain query goes through.
//! 3. Payment reconciliation ([`mod@payments`]). Transaction matching and validation, the payment monitor, refund
//!    execution and the order state machine.
//! 4. The public API ([`OrderFlowApi`] and [`RefundApi`]).
//!
//! The engine also emits events ([`mod@events`]) when an order is paid or a refund finishes, so that notifications
//! can be sent without holding up the payment flows.
mod epe_api;
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod events;
pub mod payments;
pub mod solana;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use epe_api::{
    errors::{OrderFlowError, RefundError},
    order_flow_api::OrderFlowApi,
    refund_api::RefundApi,
    refund_objects::{RefundReceipt, RefundRequest},
};
pub use payments::{PaymentConfig, PaymentMonitor};
pub use solana::SolanaRpc;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{OrderManagement, RefundManagement, StoreError};
