use chrono::Utc;
use elurc_payment_engine::{
    db_types::{DiscrepancyResolution, ElurcAmount, EurCents, NewOrder, OrderItem, OrderStatusType},
    RefundReceipt,
};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/admin/orders`. The creation time is always the time the request is handled, since payments are
/// only matched against transfers made after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderParams {
    pub order_number: String,
    pub amount_elurc: ElurcAmount,
    #[serde(default)]
    pub amount_eur: EurCents,
    pub customer_wallet: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl From<NewOrderParams> for NewOrder {
    fn from(params: NewOrderParams) -> Self {
        let NewOrderParams { order_number, amount_elurc, amount_eur, customer_wallet, customer_email, items } = params;
        NewOrder {
            order_number,
            amount_elurc,
            amount_eur,
            customer_wallet,
            customer_email,
            items,
            created_at: Utc::now(),
        }
    }
}

/// Body of `POST /api/admin/order/{order_id}/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub status: OrderStatusType,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of `POST /api/admin/order/{order_id}/discrepancy`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscrepancyResolutionParams {
    pub resolution: DiscrepancyResolution,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResponse {
    pub success: bool,
    #[serde(flatten)]
    pub receipt: RefundReceipt,
}

impl From<RefundReceipt> for RefundResponse {
    fn from(receipt: RefundReceipt) -> Self {
        Self { success: true, receipt }
    }
}
