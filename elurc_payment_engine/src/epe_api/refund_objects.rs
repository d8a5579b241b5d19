use serde::{Deserialize, Serialize};

use crate::db_types::{ElurcAmount, OrderId};

/// An admin's request to refund (part of) an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub order_id: OrderId,
    pub refund_amount: ElurcAmount,
    /// Where the refund goes. This may differ from the wallet that paid for the order.
    pub wallet_address: String,
    pub reason: String,
    #[serde(default)]
    pub admin_notes: Option<String>,
    /// Filled in by the server from the authenticated admin, never taken from the request body
    #[serde(skip_deserializing, default)]
    pub initiated_by: Option<String>,
    #[serde(skip_deserializing, default)]
    pub source_ip: Option<String>,
}

impl RefundRequest {
    pub fn new<S: Into<String>>(order_id: OrderId, refund_amount: ElurcAmount, wallet_address: S, reason: S) -> Self {
        Self {
            order_id,
            refund_amount,
            wallet_address: wallet_address.into(),
            reason: reason.into(),
            admin_notes: None,
            initiated_by: None,
            source_ip: None,
        }
    }

    pub fn with_audit(mut self, initiated_by: Option<String>, source_ip: Option<String>) -> Self {
        self.initiated_by = initiated_by;
        self.source_ip = source_ip;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundReceipt {
    /// The refund number
    pub refund_id: String,
    pub transaction_signature: String,
    pub refund_amount: ElurcAmount,
}
