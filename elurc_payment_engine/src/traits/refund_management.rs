use crate::{
    db_types::{ElurcAmount, NewRefund, OrderId, Refund},
    traits::StoreError,
};

#[allow(async_fn_in_trait)]
pub trait RefundManagement {
    /// Creates a `pending` refund record.
    ///
    /// In a single atomic transaction, this fails with
    /// * [`StoreError::OrderNotFound`] if the order does not exist,
    /// * [`StoreError::RefundInProgress`] if the order already has a `pending` or `processing` refund,
    /// * [`StoreError::RefundExceedsOrder`] if the completed refunds plus this one would exceed the order amount.
    async fn create_refund(&self, refund: NewRefund) -> Result<Refund, StoreError>;

    /// `pending` → `processing`. Must be persisted before any chain call is made for the refund.
    async fn mark_refund_processing(&self, refund_number: &str) -> Result<Refund, StoreError>;

    /// `processing` → `completed`
    async fn mark_refund_completed(&self, refund_number: &str, signature: &str) -> Result<Refund, StoreError>;

    /// `pending` or `processing` → `failed`
    async fn mark_refund_failed(&self, refund_number: &str, error: &str) -> Result<Refund, StoreError>;

    async fn fetch_refund(&self, refund_number: &str) -> Result<Option<Refund>, StoreError>;

    /// All refund records for the order, oldest first
    async fn fetch_refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, StoreError>;

    async fn total_completed_refunds(&self, order_id: &OrderId) -> Result<ElurcAmount, StoreError>;

    /// Refunds stuck in `processing`. The chain transfer for these may or may not have gone through, so they need
    /// to be reconciled by hand against the shop wallet's history.
    async fn fetch_stuck_refunds(&self) -> Result<Vec<Refund>, StoreError>;
}
