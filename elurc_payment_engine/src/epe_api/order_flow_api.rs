use std::{fmt::Debug, str::FromStr};

use log::*;

use crate::{
    db_types::{
        ChangedBy,
        DiscrepancyResolution,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        OrderStatusUpdate,
        StatusHistoryEntry,
    },
    epe_api::errors::OrderFlowError,
    payments::check_transition,
    solana::Pubkey,
    traits::{OrderManagement, StoreError},
};

/// `OrderFlowApi` handles order creation and every status change that is not driven by the payment monitor.
pub struct OrderFlowApi<B> {
    db: B,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Stores a new `pending` order. Item prices are stored as given and never re-read from the catalogue.
    pub async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        if !order.amount_elurc.is_positive() {
            let msg = format!("Order amount must be positive, got {}", order.amount_elurc);
            return Err(OrderFlowError::InvalidOrder(msg));
        }
        if order.order_number.trim().is_empty() {
            return Err(OrderFlowError::InvalidOrder("Order number is required".into()));
        }
        if let Err(e) = Pubkey::from_str(&order.customer_wallet) {
            return Err(OrderFlowError::InvalidOrder(format!("Invalid customer wallet {}. {e}", order.customer_wallet)));
        }
        if let Some(item) = order.items.iter().find(|i| i.quantity == 0) {
            return Err(OrderFlowError::InvalidOrder(format!("Item {} has a quantity of zero", item.product_id)));
        }
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order {} ({}) created for {}", order.id, order.order_number, order.amount_elurc);
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }

    pub async fn status_history(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, OrderFlowError> {
        match self.db.fetch_status_history(order_id).await {
            Ok(history) => Ok(history),
            Err(StoreError::OrderNotFound(id)) => Err(OrderFlowError::OrderNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Moves the order to `new_status`, if the order state machine allows it.
    ///
    /// The change is applied against the status that was read, so if the order changes underneath this call (e.g.
    /// the payment monitor commits it), the update fails with a `StatusConflict` instead of overwriting it.
    pub async fn modify_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        changed_by: ChangedBy,
        reason: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        check_transition(order.status, new_status)?;
        let mut update = OrderStatusUpdate::new(new_status, changed_by);
        update.reason = reason;
        let updated = self.db.update_order_status(order_id, order.status, update).await?;
        info!("🔄️ Order {order_id} moved from {} to {new_status} by {changed_by}", order.status);
        Ok(updated)
    }

    /// Records the outcome of an admin's review of a payment discrepancy.
    pub async fn resolve_discrepancy(
        &self,
        order_id: &OrderId,
        resolution: DiscrepancyResolution,
        notes: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.payment_discrepancy.is_none() {
            return Err(OrderFlowError::NoDiscrepancy(order_id.clone()));
        }
        let updated = self.db.update_discrepancy_resolution(order_id, resolution, notes).await?;
        info!("🔄️ Discrepancy on {order_id} resolved as {resolution}");
        Ok(updated)
    }
}
