use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, Refund};

/// Published once, when the payment monitor commits an order as paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundCompletedEvent {
    pub order: Order,
    pub refund: Refund,
}

impl RefundCompletedEvent {
    pub fn new(order: Order, refund: Refund) -> Self {
        Self { order, refund }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundFailedEvent {
    pub order_id: OrderId,
    pub refund: Refund,
}

impl RefundFailedEvent {
    pub fn new(order_id: OrderId, refund: Refund) -> Self {
        Self { order_id, refund }
    }
}
