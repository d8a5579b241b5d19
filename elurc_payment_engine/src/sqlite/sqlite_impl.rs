//! `SqliteDatabase` is the concrete storage backend for the ELURC payment engine.
//!
//! It implements all the traits defined in the [`crate::traits`] module. Every multi-statement operation runs inside
//! a single transaction.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::{migrate, Sqlite, SqlitePool, Transaction};

use super::db::{db_url, is_unique_violation, new_pool, orders, refunds};
use crate::{
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
        RefundStatus,
    },
    traits::{OrderManagement, RefundManagement, StoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `ELURC_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    async fn fetch_existing(&self, order_id: &OrderId) -> Result<Order, StoreError> {
        self.fetch_order(order_id).await?.ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))
    }

    /// Commits a conditional refund update, or rolls it back and works out why it touched no rows
    async fn finish_refund_transition(
        &self,
        mut tx: Transaction<'_, Sqlite>,
        refund_number: &str,
        to: RefundStatus,
        updated: Option<Refund>,
    ) -> Result<Refund, StoreError> {
        if let Some(refund) = updated {
            tx.commit().await?;
            trace!("🗃️ Refund {refund_number} is now {to}");
            return Ok(refund);
        }
        let existing = refunds::fetch_refund(refund_number, &mut tx).await?;
        tx.rollback().await?;
        match existing {
            Some(refund) => {
                Err(StoreError::IllegalRefundTransition { refund: refund_number.to_string(), from: refund.status, to })
            },
            None => Err(StoreError::RefundNotFound(refund_number.to_string())),
        }
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let order_number = order.order_number.clone();
        let mut tx = self.pool.begin().await?;
        let id = match orders::insert_order(order, &mut tx).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => return Err(StoreError::DuplicateOrder(order_number)),
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;
        self.fetch_existing(&id).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_with_status(&self, status: OrderStatusType) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_with_status(status, &mut conn).await?;
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatusType,
        update: OrderStatusUpdate,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let swapped = orders::update_order_status(order_id, expected, &update, Utc::now(), &mut tx).await?;
        if !swapped {
            let actual = orders::fetch_order_row(order_id, &mut tx).await?.map(|o| o.status);
            tx.rollback().await?;
            return match actual {
                None => Err(StoreError::OrderNotFound(order_id.clone())),
                Some(actual) => Err(StoreError::StatusConflict { order_id: order_id.clone(), expected, actual }),
            };
        }
        tx.commit().await?;
        self.fetch_existing(order_id).await
    }

    async fn record_discrepancy(
        &self,
        order_id: &OrderId,
        discrepancy: PaymentDiscrepancy,
    ) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let n = orders::set_discrepancy(order_id, &discrepancy, Utc::now(), &mut conn).await?;
        if n == 0 {
            return Err(StoreError::OrderNotFound(order_id.clone()));
        }
        debug!(
            "🗃️ Recorded {} discrepancy of {} on {order_id}",
            discrepancy.discrepancy_type, discrepancy.difference_amount
        );
        self.fetch_existing(order_id).await
    }

    async fn update_discrepancy_resolution(
        &self,
        order_id: &OrderId,
        resolution: DiscrepancyResolution,
        notes: Option<String>,
    ) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let n =
            orders::set_discrepancy_resolution(order_id, resolution, notes.as_deref(), Utc::now(), &mut conn).await?;
        if n == 0 {
            trace!("🗃️ {order_id} has no discrepancy to resolve, or does not exist");
        }
        self.fetch_existing(order_id).await
    }

    async fn record_refund_info(&self, order_id: &OrderId, info: RefundInfo) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let n = orders::set_refund_info(order_id, &info, Utc::now(), &mut conn).await?;
        if n == 0 {
            return Err(StoreError::OrderNotFound(order_id.clone()));
        }
        self.fetch_existing(order_id).await
    }
}

impl RefundManagement for SqliteDatabase {
    async fn create_refund(&self, refund: NewRefund) -> Result<Refund, StoreError> {
        let order_id = refund.order_id.clone();
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_row(&order_id, &mut tx)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        if refunds::count_in_flight(&order_id, &mut tx).await? > 0 {
            return Err(StoreError::RefundInProgress(order_id));
        }
        let refunded = refunds::total_completed(&order_id, &mut tx).await?;
        if refunded + refund.amount > order.amount_elurc {
            return Err(StoreError::RefundExceedsOrder {
                order_id,
                requested: refund.amount,
                refunded,
                order_amount: order.amount_elurc,
            });
        }
        let refund = match refunds::insert_refund(refund, Utc::now(), &mut tx).await {
            Ok(r) => r,
            // The partial unique index caught a concurrent refund for the same order
            Err(e) if is_unique_violation(&e) => return Err(StoreError::RefundInProgress(order_id)),
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;
        Ok(refund)
    }

    async fn mark_refund_processing(&self, refund_number: &str) -> Result<Refund, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = refunds::mark_processing(refund_number, Utc::now(), &mut tx).await?;
        self.finish_refund_transition(tx, refund_number, RefundStatus::Processing, updated).await
    }

    async fn mark_refund_completed(&self, refund_number: &str, signature: &str) -> Result<Refund, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = refunds::mark_completed(refund_number, signature, Utc::now(), &mut tx).await?;
        self.finish_refund_transition(tx, refund_number, RefundStatus::Completed, updated).await
    }

    async fn mark_refund_failed(&self, refund_number: &str, error: &str) -> Result<Refund, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = refunds::mark_failed(refund_number, error, Utc::now(), &mut tx).await?;
        self.finish_refund_transition(tx, refund_number, RefundStatus::Failed, updated).await
    }

    async fn fetch_refund(&self, refund_number: &str) -> Result<Option<Refund>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let refund = refunds::fetch_refund(refund_number, &mut conn).await?;
        Ok(refund)
    }

    async fn fetch_refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let refunds = refunds::fetch_refunds_for_order(order_id, &mut conn).await?;
        Ok(refunds)
    }

    async fn total_completed_refunds(&self, order_id: &OrderId) -> Result<ElurcAmount, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let total = refunds::total_completed(order_id, &mut conn).await?;
        Ok(total)
    }

    async fn fetch_stuck_refunds(&self) -> Result<Vec<Refund>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let stuck = refunds::fetch_refunds_with_status(RefundStatus::Processing, &mut conn).await?;
        if !stuck.is_empty() {
            warn!("💸️ {} refunds are stuck in processing and need manual reconciliation", stuck.len());
        }
        Ok(stuck)
    }
}
