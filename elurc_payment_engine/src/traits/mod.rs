//! # Storage backends
//!
//! These traits define the contracts that a storage backend must honour to support the payment engine. The engine
//! never talks to a database directly; the APIs in [`crate::epe_api`] and the flows in [`crate::payments`] are generic
//! over these traits.
//!
//! * [`OrderManagement`] loads orders and applies status transitions. Status updates are compare-and-swap on the
//!   current status, so two concurrent payment polls cannot both commit the same order.
//! * [`RefundManagement`] records refund attempts. Backends must enforce, atomically, that an order has at most one
//!   refund in flight and that completed refunds never exceed the order total.
mod errors;
mod order_management;
mod refund_management;

pub use errors::StoreError;
pub use order_management::OrderManagement;
pub use refund_management::RefundManagement;
