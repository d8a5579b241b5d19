use chrono::{DateTime, Utc};

use crate::{
    db_types::{
        DiscrepancyResolution,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        OrderStatusUpdate,
        PaymentDiscrepancy,
        RefundInfo,
        StatusHistoryEntry,
    },
    traits::StoreError,
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order in `pending` status, along with its line items and the initial status history entry.
    /// Fails with [`StoreError::DuplicateOrder`] if the order number is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Fetches the order, including its items and full status history.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError>;

    /// The order's status history, oldest entry first.
    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let order = self.fetch_order(order_id).await?.ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        Ok(order.status_history)
    }

    /// All orders currently in `status`, oldest first.
    async fn fetch_orders_with_status(&self, status: OrderStatusType) -> Result<Vec<Order>, StoreError>;

    /// Atomically moves the order from `expected` to `update.new_status` and appends one status history entry.
    ///
    /// If the stored status is no longer `expected`, nothing is written and [`StoreError::StatusConflict`] is
    /// returned. Transition legality is the caller's responsibility.
    ///
    /// `fulfilled_at` is stamped the first time the order enters `fulfilled`, and never again.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatusType,
        update: OrderStatusUpdate,
    ) -> Result<Order, StoreError>;

    /// Records (or replaces) the payment discrepancy for the order.
    async fn record_discrepancy(&self, order_id: &OrderId, discrepancy: PaymentDiscrepancy)
        -> Result<Order, StoreError>;

    /// Updates the resolution of an existing discrepancy. If the order has no discrepancy, nothing changes.
    async fn update_discrepancy_resolution(
        &self,
        order_id: &OrderId,
        resolution: DiscrepancyResolution,
        notes: Option<String>,
    ) -> Result<Order, StoreError>;

    async fn record_refund_info(&self, order_id: &OrderId, info: RefundInfo) -> Result<Order, StoreError>;

    /// Pending orders created before `cutoff`
    async fn fetch_pending_orders_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let orders = self.fetch_orders_with_status(OrderStatusType::Pending).await?;
        Ok(orders.into_iter().filter(|o| o.created_at < cutoff).collect())
    }
}
