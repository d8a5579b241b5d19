use std::{fmt::Debug, str::FromStr, sync::Arc};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{DiscrepancyResolution, ElurcAmount, NewRefund, Order, OrderId, OrderStatusType, Refund, RefundInfo},
    epe_api::{
        errors::RefundError,
        refund_objects::{RefundReceipt, RefundRequest},
    },
    events::{EventProducers, RefundCompletedEvent, RefundFailedEvent},
    payments::{validate_refund_amount_with_minimum, PaymentConfig, RefundExecutor, RefundOutcome},
    solana::{Keypair, Pubkey, RetryPolicy, SolanaRpc},
    traits::{OrderManagement, RefundManagement, StoreError},
};

/// `RefundApi` runs refunds end to end.
///
/// The refund record is created `pending` and moved to `processing` before any chain call is made, so a crash during
/// the transfer leaves a `processing` record behind for reconciliation (see [`RefundApi::stuck_refunds`]). A transfer
/// that was submitted but never confirmed is left in `processing` too.
pub struct RefundApi<B, C> {
    db: B,
    rpc: C,
    config: PaymentConfig,
    shop_keypair: Option<Arc<Keypair>>,
    retry: RetryPolicy,
    producers: EventProducers,
}

impl<B, C> Debug for RefundApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi (configured: {})", self.shop_keypair.is_some())
    }
}

impl<B, C> RefundApi<B, C> {
    /// `shop_keypair` may be `None`, in which case every refund is rejected with [`RefundError::NotConfigured`].
    pub fn new(
        db: B,
        rpc: C,
        config: PaymentConfig,
        shop_keypair: Option<Arc<Keypair>>,
        producers: EventProducers,
    ) -> Self {
        Self { db, rpc, config, shop_keypair, retry: RetryPolicy::default(), producers }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl<B, C> RefundApi<B, C>
where
    B: OrderManagement + RefundManagement,
    C: SolanaRpc,
{
    pub async fn process_refund(&self, request: RefundRequest) -> Result<RefundReceipt, RefundError> {
        let keypair = self.shop_keypair.as_ref().ok_or(RefundError::NotConfigured)?;
        let order_id = request.order_id.clone();
        let order =
            self.db.fetch_order(&order_id).await?.ok_or_else(|| RefundError::OrderNotFound(order_id.clone()))?;
        if order.status == OrderStatusType::Pending {
            return Err(RefundError::OrderNotRefundable(order_id, order.status));
        }
        if Pubkey::from_str(&request.wallet_address).is_err() {
            return Err(RefundError::InvalidWallet(request.wallet_address));
        }
        let previous = self.db.total_completed_refunds(&order_id).await?;
        let check = validate_refund_amount_with_minimum(
            order.amount_elurc,
            request.refund_amount,
            previous,
            self.config.refund_minimum,
        );
        if let Some(error) = check.error {
            debug!("💸️ Refund request for {order_id} rejected. {error}");
            return Err(RefundError::InvalidAmount(error));
        }

        let refund = self.create_refund(&request).await?;
        let refund_number = refund.refund_number.clone();
        info!(
            "💸️ Refund {refund_number} of {} for order {order_id} to {} created by {}",
            refund.amount,
            refund.wallet_address,
            refund.initiated_by.as_deref().unwrap_or("unknown")
        );
        let has_discrepancy = order.payment_discrepancy.is_some();
        let refund = match self.prepare_refund(&refund, has_discrepancy).await {
            Ok(r) => r,
            Err(e) => {
                warn!("💸️ Could not prepare refund {refund_number}. Marking it as failed. {e}");
                if let Err(e2) = self.db.mark_refund_failed(&refund_number, &e.to_string()).await {
                    error!("💸️ Refund {refund_number} could not be marked as failed either. {e2}");
                }
                return Err(e.into());
            },
        };

        let executor = RefundExecutor::new(&self.rpc).with_retry_policy(self.retry);
        let outcome =
            executor.execute_refund(&refund.wallet_address, refund.amount, keypair, &self.config.token_mint).await;
        match outcome {
            RefundOutcome { success: true, signature: Some(signature), .. } => {
                self.complete_refund(order, refund, signature).await
            },
            RefundOutcome { pending: true, signature: Some(signature), .. } => {
                // Still `processing`, so no other refund can start for this order until it has been reconciled
                error!(
                    "💸️ Refund {refund_number} for order {order_id} was submitted as {signature} but not confirmed. It \
                     stays in processing and must be reconciled against the chain by hand."
                );
                Err(RefundError::Unconfirmed { refund_number, signature })
            },
            RefundOutcome { signature, error, .. } => {
                let reason = error.unwrap_or_else(|| format!("Unexpected refund outcome ({signature:?})"));
                self.fail_refund(&order_id, &refund_number, reason, has_discrepancy).await
            },
        }
    }

    async fn create_refund(&self, request: &RefundRequest) -> Result<Refund, RefundError> {
        let mut new_refund = NewRefund::new(
            request.order_id.clone(),
            request.refund_amount,
            request.wallet_address.clone(),
            request.reason.clone(),
        );
        new_refund.admin_notes = request.admin_notes.clone();
        new_refund.initiated_by = request.initiated_by.clone();
        new_refund.source_ip = request.source_ip.clone();
        self.db.create_refund(new_refund).await.map_err(|e| match e {
            StoreError::RefundInProgress(id) => RefundError::RefundInProgress(id),
            StoreError::OrderNotFound(id) => RefundError::OrderNotFound(id),
            e @ StoreError::RefundExceedsOrder { .. } => RefundError::InvalidAmount(e.to_string()),
            e => RefundError::Store(e),
        })
    }

    /// Bookkeeping that must happen before any chain call, ending with the refund in `processing`
    async fn prepare_refund(&self, refund: &Refund, has_discrepancy: bool) -> Result<Refund, StoreError> {
        if has_discrepancy {
            self.db
                .update_discrepancy_resolution(&refund.order_id, DiscrepancyResolution::RefundInitiated, None)
                .await?;
        }
        self.db.record_refund_info(&refund.order_id, refund_info(refund, None)).await?;
        self.db.mark_refund_processing(&refund.refund_number).await
    }

    async fn complete_refund(
        &self,
        order: Order,
        refund: Refund,
        signature: String,
    ) -> Result<RefundReceipt, RefundError> {
        let refund = match self.db.mark_refund_completed(&refund.refund_number, &signature).await {
            Ok(r) => r,
            Err(e) => {
                error!(
                    "💸️ Refund {} was sent in {signature}, but could not be marked as completed. It must be \
                     reconciled by hand. {e}",
                    refund.refund_number
                );
                return Err(e.into());
            },
        };
        self.db.record_refund_info(&order.id, refund_info(&refund, Some(signature.clone()))).await?;
        let order = if order.payment_discrepancy.is_some() {
            self.db.update_discrepancy_resolution(&order.id, DiscrepancyResolution::RefundCompleted, None).await?
        } else {
            order
        };
        info!("💸️ Refund {} for order {} completed in {signature}", refund.refund_number, order.id);
        let receipt = RefundReceipt {
            refund_id: refund.refund_number.clone(),
            transaction_signature: signature,
            refund_amount: refund.amount,
        };
        for emitter in &self.producers.refund_completed_producer {
            emitter.try_publish_event(RefundCompletedEvent::new(order.clone(), refund.clone()));
        }
        Ok(receipt)
    }

    async fn fail_refund(
        &self,
        order_id: &OrderId,
        refund_number: &str,
        reason: String,
        has_discrepancy: bool,
    ) -> Result<RefundReceipt, RefundError> {
        let refund = self.db.mark_refund_failed(refund_number, &reason).await?;
        if has_discrepancy {
            self.db.update_discrepancy_resolution(order_id, DiscrepancyResolution::Pending, None).await?;
        }
        for emitter in &self.producers.refund_failed_producer {
            emitter.try_publish_event(RefundFailedEvent::new(order_id.clone(), refund.clone()));
        }
        Err(RefundError::ExecutionFailed { refund_number: refund_number.to_string(), reason })
    }

    pub async fn refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, RefundError> {
        if self.db.fetch_order(order_id).await?.is_none() {
            return Err(RefundError::OrderNotFound(order_id.clone()));
        }
        Ok(self.db.fetch_refunds_for_order(order_id).await?)
    }

    pub async fn total_refunded(&self, order_id: &OrderId) -> Result<ElurcAmount, RefundError> {
        Ok(self.db.total_completed_refunds(order_id).await?)
    }

    /// Refunds left in `processing`, whose on-chain outcome is unknown
    pub async fn stuck_refunds(&self) -> Result<Vec<Refund>, RefundError> {
        Ok(self.db.fetch_stuck_refunds().await?)
    }
}

fn refund_info(refund: &Refund, signature: Option<String>) -> RefundInfo {
    let completed_at = signature.as_ref().map(|_| refund.completed_at.unwrap_or_else(Utc::now));
    RefundInfo {
        amount: refund.amount,
        wallet_address: refund.wallet_address.clone(),
        transaction_signature: signature,
        initiated_at: refund.created_at,
        completed_at,
        reason: refund.reason.clone(),
    }
}
