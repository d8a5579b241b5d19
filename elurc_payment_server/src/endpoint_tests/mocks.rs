use chrono::{DateTime, Utc};
use elurc_payment_engine::{
    db_types::{
        DiscrepancyResolution,
        ElurcAmount,
        NewOrder,
        NewRefund,
        Order,
        OrderId,
        OrderStatusType,
        OrderStatusUpdate,
        PaymentDiscrepancy,
        Refund,
        RefundInfo,
        StatusHistoryEntry,
    },
    OrderManagement,
    RefundManagement,
    StoreError,
};
use mockall::mock;

mock! {
    pub Store {}
    impl OrderManagement for Store {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;
        async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError>;
        async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, StoreError>;
        async fn fetch_orders_with_status(&self, status: OrderStatusType) -> Result<Vec<Order>, StoreError>;
        async fn update_order_status(&self, order_id: &OrderId, expected: OrderStatusType, update: OrderStatusUpdate) -> Result<Order, StoreError>;
        async fn record_discrepancy(&self, order_id: &OrderId, discrepancy: PaymentDiscrepancy) -> Result<Order, StoreError>;
        async fn update_discrepancy_resolution(&self, order_id: &OrderId, resolution: DiscrepancyResolution, notes: Option<String>) -> Result<Order, StoreError>;
        async fn record_refund_info(&self, order_id: &OrderId, info: RefundInfo) -> Result<Order, StoreError>;
        async fn fetch_pending_orders_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
    }
    impl RefundManagement for Store {
        async fn create_refund(&self, refund: NewRefund) -> Result<Refund, StoreError>;
        async fn mark_refund_processing(&self, refund_number: &str) -> Result<Refund, StoreError>;
        async fn mark_refund_completed(&self, refund_number: &str, signature: &str) -> Result<Refund, StoreError>;
        async fn mark_refund_failed(&self, refund_number: &str, error: &str) -> Result<Refund, StoreError>;
        async fn fetch_refund(&self, refund_number: &str) -> Result<Option<Refund>, StoreError>;
        async fn fetch_refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, StoreError>;
        async fn total_completed_refunds(&self, order_id: &OrderId) -> Result<ElurcAmount, StoreError>;
        async fn fetch_stuck_refunds(&self) -> Result<Vec<Refund>, StoreError>;
    }
}
