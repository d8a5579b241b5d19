use thiserror::Error;

use crate::db_types::{ElurcAmount, OrderId, OrderStatusType, RefundStatus};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("An order with order number {0} already exists")]
    DuplicateOrder(String),
    #[error("Order {order_id} was expected to be {expected}, but it is {actual}")]
    StatusConflict { order_id: OrderId, expected: OrderStatusType, actual: OrderStatusType },
    #[error("Refund {0} does not exist")]
    RefundNotFound(String),
    #[error("Order {0} already has a refund in progress")]
    RefundInProgress(OrderId),
    #[error(
        "Refund of {requested} for order {order_id} would exceed the order amount of {order_amount} ({refunded} already \
         refunded)"
    )]
    RefundExceedsOrder { order_id: OrderId, requested: ElurcAmount, refunded: ElurcAmount, order_amount: ElurcAmount },
    #[error("Refund {refund} cannot move from {from} to {to}")]
    IllegalRefundTransition { refund: String, from: RefundStatus, to: RefundStatus },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
