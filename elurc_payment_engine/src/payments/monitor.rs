use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, TimeZone, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{PaymentConfig, TransactionMatch, TransactionMatcher, TransactionValidator, ValidationOptions};
use crate::{
    db_types::{
        ChangedBy,
        ElurcAmount,
        Order,
        OrderId,
        OrderStatusType,
        OrderStatusUpdate,
        PaymentDiscrepancy,
    },
    events::{EventProducers, OrderPaidEvent},
    solana::{ChainError, SolanaRpc},
    traits::{OrderManagement, StoreError},
};

/// The source of "now" for the payment window and transaction age checks.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentCheckStatus {
    /// No payment yet. Poll again later.
    Pending,
    Confirmed,
    Timeout,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResult {
    pub status: PaymentCheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<ElurcAmount>,
    /// Milliseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PaymentStatusResult {
    pub fn pending() -> Self {
        Self::with_status(PaymentCheckStatus::Pending, None)
    }

    pub fn timeout() -> Self {
        Self::with_status(PaymentCheckStatus::Timeout, Some("Payment window has expired".into()))
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::with_status(PaymentCheckStatus::Error, Some(message.into()))
    }

    fn with_status(status: PaymentCheckStatus, message: Option<String>) -> Self {
        Self { status, transaction_signature: None, amount: None, timestamp: None, message }
    }

    fn confirmed(signature: Option<String>, amount: ElurcAmount, timestamp: Option<i64>) -> Self {
        Self {
            status: PaymentCheckStatus::Confirmed,
            transaction_signature: signature,
            amount: Some(amount),
            timestamp,
            message: None,
        }
    }

    fn from_match(m: TransactionMatch) -> Self {
        Self::confirmed(Some(m.signature), m.amount, Some(m.timestamp))
    }
}

#[derive(Debug, Clone, Error)]
enum PaymentMonitorError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Could not load or update the order. {0}")]
    Store(#[from] StoreError),
    #[error("Could not query the blockchain. {0}")]
    Chain(#[from] ChainError),
}

/// Drives pending orders towards `paid` or `timeout`.
///
/// Each call to [`PaymentMonitor::check_payment_status`] is a single, independent poll. Concurrent polls of the same
/// order are safe: the `pending → paid` commit is a compare-and-swap, so only one of them wins, and the loser reports
/// the winner's result.
pub struct PaymentMonitor<B, C> {
    db: B,
    rpc: C,
    config: PaymentConfig,
    producers: EventProducers,
    clock: Clock,
}

impl<B, C> Debug for PaymentMonitor<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentMonitor({:?})", self.config)
    }
}

impl<B, C> PaymentMonitor<B, C> {
    pub fn new(db: B, rpc: C, config: PaymentConfig, producers: EventProducers) -> Self {
        Self { db, rpc, config, producers, clock: Arc::new(Utc::now) }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

impl<B, C> PaymentMonitor<B, C>
where
    B: OrderManagement,
    C: SolanaRpc,
{
    /// Checks whether the order has been paid, committing it as `paid` if a valid payment is found on-chain, or as
    /// `timeout` if the payment window has passed.
    ///
    /// This never fails. Problems are reported as [`PaymentCheckStatus::Error`] with a message.
    pub async fn check_payment_status(&self, order_id: &OrderId) -> PaymentStatusResult {
        match self.try_check_payment_status(order_id).await {
            Ok(result) => result,
            Err(PaymentMonitorError::OrderNotFound(id)) => {
                debug!("📡️ Payment check for unknown order {id}");
                PaymentStatusResult::error("Order not found")
            },
            Err(e) => {
                warn!("📡️ Payment check for {order_id} failed. {e}");
                PaymentStatusResult::error(e.to_string())
            },
        }
    }

    async fn try_check_payment_status(&self, order_id: &OrderId) -> Result<PaymentStatusResult, PaymentMonitorError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentMonitorError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatusType::Pending {
            return Ok(Self::report_committed(&order));
        }
        let now = self.now();
        if now - order.created_at > self.config.payment_window {
            return self.expire_order(order).await;
        }

        let signatures =
            self.rpc.get_signatures_for_address(&order.customer_wallet, self.config.signature_page_size).await?;
        trace!("📡️ {} recent signatures for {}", signatures.len(), order.customer_wallet);
        let matcher = TransactionMatcher::new(&self.rpc, &self.config);
        let Some(found) = matcher.find_matching_transaction(&signatures, &order).await else {
            trace!("📡️ No payment for {order_id} yet");
            return Ok(PaymentStatusResult::pending());
        };

        if !found.classification.is_exact() {
            self.record_discrepancy(&order, &found).await?;
        }

        let validator = TransactionValidator::new(&self.rpc);
        let options = ValidationOptions::for_order(&order, &self.config);
        let validation = validator.validate_transaction(&found.signature, &options, now).await;
        if !validation.valid {
            let message = validation.errors.join("; ");
            warn!("📡️ Payment {} for {order_id} matched but failed validation: {message}", found.signature);
            return Ok(PaymentStatusResult::error(message));
        }
        for w in &validation.warnings {
            debug!("📡️ [{order_id}] {}: {w}", found.signature);
        }

        self.commit_payment(order, found).await
    }

    /// What to report for an order that has already left `pending`
    fn report_committed(order: &Order) -> PaymentStatusResult {
        match order.status {
            s if s.is_settled() => PaymentStatusResult::confirmed(
                order.transaction_signature.clone(),
                amount_received(order),
                order.paid_at.map(|t| t.timestamp_millis()),
            ),
            OrderStatusType::Timeout => PaymentStatusResult::timeout(),
            OrderStatusType::Cancelled => PaymentStatusResult::error("Order has been cancelled"),
            _ => PaymentStatusResult::pending(),
        }
    }

    async fn expire_order(&self, order: Order) -> Result<PaymentStatusResult, PaymentMonitorError> {
        let update = OrderStatusUpdate::new(OrderStatusType::Timeout, ChangedBy::System)
            .with_reason(format!("No payment within {} minutes", self.config.payment_window.num_minutes()));
        match self.db.update_order_status(&order.id, OrderStatusType::Pending, update).await {
            Ok(_) => {
                info!("📡️ Order {} timed out waiting for payment", order.id);
                Ok(PaymentStatusResult::timeout())
            },
            Err(StoreError::StatusConflict { .. }) => self.reread(&order.id).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn record_discrepancy(&self, order: &Order, found: &TransactionMatch) -> Result<(), PaymentMonitorError> {
        let already_recorded = order
            .payment_discrepancy
            .as_ref()
            .map(|d| d.difference_amount == found.difference)
            .unwrap_or(false);
        if already_recorded {
            return Ok(());
        }
        let mut discrepancy = PaymentDiscrepancy::detected(found.difference, found.classification.discrepancy_type());
        discrepancy.detected_at = self.now();
        discrepancy.notes = Some(format!("Transaction {}", found.signature));
        info!(
            "📡️ Order {} was {} by {} in {}",
            order.id,
            found.classification,
            found.difference.abs(),
            found.signature
        );
        self.db.record_discrepancy(&order.id, discrepancy).await?;
        Ok(())
    }

    async fn commit_payment(
        &self,
        order: Order,
        found: TransactionMatch,
    ) -> Result<PaymentStatusResult, PaymentMonitorError> {
        let paid_at = Utc.timestamp_millis_opt(found.timestamp).single().unwrap_or_else(|| self.now());
        let update = OrderStatusUpdate::new(OrderStatusType::Paid, ChangedBy::System)
            .with_reason(format!("Payment {} confirmed on-chain", found.signature))
            .with_payment(found.signature.clone(), paid_at);
        match self.db.update_order_status(&order.id, OrderStatusType::Pending, update).await {
            Ok(paid) => {
                info!("📡️ Order {} is paid. Transaction {}", paid.id, found.signature);
                self.call_order_paid_hook(paid);
                Ok(PaymentStatusResult::from_match(found))
            },
            Err(StoreError::StatusConflict { actual, .. }) => {
                debug!("📡️ Order {} was moved to {actual} by someone else while it was being checked", order.id);
                self.reread(&order.id).await
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn reread(&self, order_id: &OrderId) -> Result<PaymentStatusResult, PaymentMonitorError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentMonitorError::OrderNotFound(order_id.clone()))?;
        Ok(Self::report_committed(&order))
    }

    fn call_order_paid_hook(&self, order: Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("📬️ Notifying order paid hook subscribers");
            emitter.try_publish_event(OrderPaidEvent::new(order.clone()));
        }
    }

    /// Moves every `pending` order whose payment window has passed to `timeout`. Returns the expired orders.
    pub async fn expire_stale_orders(&self) -> Result<Vec<Order>, StoreError> {
        let cutoff = self.now() - self.config.payment_window;
        let stale = self.db.fetch_pending_orders_created_before(cutoff).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for order in stale {
            let update = OrderStatusUpdate::new(OrderStatusType::Timeout, ChangedBy::System)
                .with_reason(format!("No payment within {} minutes", self.config.payment_window.num_minutes()));
            match self.db.update_order_status(&order.id, OrderStatusType::Pending, update).await {
                Ok(o) => expired.push(o),
                Err(StoreError::StatusConflict { actual, .. }) => {
                    debug!("📡️ Order {} is now {actual}. Not expiring it.", order.id)
                },
                Err(e) => return Err(e),
            }
        }
        if !expired.is_empty() {
            info!("📡️ {} orders timed out", expired.len());
        }
        Ok(expired)
    }
}

/// What the customer sent for a settled order. This is the order total unless a discrepancy was recorded.
fn amount_received(order: &Order) -> ElurcAmount {
    match &order.payment_discrepancy {
        Some(d) if d.has_discrepancy => order.amount_elurc + d.difference_amount,
        _ => order.amount_elurc,
    }
}
