use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    payments::OrderStatusTransitionError,
    traits::StoreError,
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invalid order. {0}")]
    InvalidOrder(String),
    #[error(transparent)]
    Transition(#[from] OrderStatusTransitionError),
    #[error("Order {0} has no payment discrepancy to resolve")]
    NoDiscrepancy(OrderId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Error)]
pub enum RefundError {
    #[error("Refunds are not available. The shop wallet keypair has not been configured.")]
    NotConfigured,
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} is {1} and has no payment to refund")]
    OrderNotRefundable(OrderId, OrderStatusType),
    #[error("Invalid wallet address {0}")]
    InvalidWallet(String),
    #[error("{0}")]
    InvalidAmount(String),
    #[error("Order {0} already has a refund in progress")]
    RefundInProgress(OrderId),
    #[error("Refund {refund_number} failed. {reason}")]
    ExecutionFailed { refund_number: String, reason: String },
    #[error("Refund {refund_number} was submitted as {signature} but is not confirmed. It must be reconciled by hand.")]
    Unconfirmed { refund_number: String, signature: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}
