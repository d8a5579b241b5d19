use std::fmt::Display;

use log::*;
use serde::{Deserialize, Serialize};

use super::{extract_token_transfer, PaymentConfig};
use crate::{
    db_types::{DiscrepancyType, ElurcAmount, Order},
    solana::{ParsedTransactionExt, SignatureInfo, SolanaRpc},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentClassification {
    Exact,
    Overpaid,
    Underpaid,
}

impl PaymentClassification {
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact)
    }

    pub fn discrepancy_type(&self) -> DiscrepancyType {
        match self {
            Self::Exact => DiscrepancyType::None,
            Self::Overpaid => DiscrepancyType::Overpayment,
            Self::Underpaid => DiscrepancyType::Underpayment,
        }
    }
}

impl Display for PaymentClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Overpaid => write!(f, "overpaid"),
            Self::Underpaid => write!(f, "underpaid"),
        }
    }
}

/// Returns the classification and the signed difference `actual - expected`.
///
/// A difference of exactly `tolerance` in either direction is still exact.
pub fn classify_payment(
    actual: ElurcAmount,
    expected: ElurcAmount,
    tolerance: ElurcAmount,
) -> (PaymentClassification, ElurcAmount) {
    let difference = actual - expected;
    let classification = if difference.abs() <= tolerance {
        PaymentClassification::Exact
    } else if difference > tolerance {
        PaymentClassification::Overpaid
    } else {
        PaymentClassification::Underpaid
    };
    (classification, difference)
}

/// The transaction that pays for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMatch {
    pub signature: String,
    pub amount: ElurcAmount,
    /// Block time in milliseconds since the Unix epoch
    pub timestamp: i64,
    pub classification: PaymentClassification,
    pub difference: ElurcAmount,
}

pub struct TransactionMatcher<'a, C> {
    rpc: &'a C,
    config: &'a PaymentConfig,
}

impl<'a, C> TransactionMatcher<'a, C>
where C: SolanaRpc
{
    pub fn new(rpc: &'a C, config: &'a PaymentConfig) -> Self {
        Self { rpc, config }
    }

    /// Scans `signatures` (newest first) for a transfer of the payment token from the order's customer wallet to the
    /// shop wallet, made no earlier than the order itself.
    ///
    /// The first such transfer is the match, whatever its amount. If more candidates turn up, they are logged as an
    /// ambiguity but otherwise ignored. RPC failures on individual signatures are logged and the signature skipped,
    /// so this never fails; `None` means the payment has not been seen yet.
    pub async fn find_matching_transaction(
        &self,
        signatures: &[SignatureInfo],
        order: &Order,
    ) -> Option<TransactionMatch> {
        let created_at_ms = order.created_at.timestamp_millis();
        let mut found: Option<TransactionMatch> = None;
        let mut others = Vec::new();
        for info in signatures {
            let sig = info.signature.as_str();
            let Some(block_time) = info.block_time else {
                trace!("🔎️ [{}] Skipping {sig}. It has no block time yet", order.id);
                continue;
            };
            if block_time * 1000 < created_at_ms {
                trace!("🔎️ [{}] Skipping {sig}. It predates the order", order.id);
                continue;
            }
            let Some(candidate) = self.check_candidate(sig, block_time, order).await else {
                continue;
            };
            match found {
                None => {
                    debug!(
                        "🔎️ [{}] {sig} pays {} ({}, difference {})",
                        order.id, candidate.amount, candidate.classification, candidate.difference
                    );
                    found = Some(candidate);
                },
                Some(_) => others.push(candidate.signature),
            }
        }
        if let Some(m) = &found {
            if !others.is_empty() {
                warn!(
                    "🔎️ [{}] Ambiguous payment. {} was matched, but these transactions also qualify: {}",
                    order.id,
                    m.signature,
                    others.join(", ")
                );
            }
        }
        found
    }

    async fn check_candidate(&self, sig: &str, block_time: i64, order: &Order) -> Option<TransactionMatch> {
        let tx = match self.rpc.get_parsed_transaction(sig).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                trace!("🔎️ [{}] {sig} is not indexed yet", order.id);
                return None;
            },
            Err(e) => {
                warn!("🔎️ [{}] Could not fetch {sig}. {e}", order.id);
                return None;
            },
        };
        if tx.execution_error().is_some() {
            debug!("🔎️ [{}] {sig} failed on-chain. Parsing it anyway.", order.id);
        }
        let Some(transfer) = extract_token_transfer(&tx) else {
            trace!("🔎️ [{}] {sig} has no token transfer", order.id);
            return None;
        };
        let mint = self.config.token_mint.to_string();
        if transfer.mint.as_deref() != Some(mint.as_str()) {
            trace!("🔎️ [{}] {sig} transfers mint {:?}, not {mint}", order.id, transfer.mint);
            return None;
        }
        let shop = self.config.shop_wallet.to_string();
        if transfer.destination_owner.as_deref() != Some(shop.as_str()) {
            trace!("🔎️ [{}] {sig} pays {:?}, not the shop", order.id, transfer.destination_owner);
            return None;
        }
        if transfer.source_authority != order.customer_wallet {
            trace!(
                "🔎️ [{}] {sig} was sent by {}, not {}",
                order.id,
                transfer.source_authority,
                order.customer_wallet
            );
            return None;
        }
        let amount = match ElurcAmount::try_from(transfer.amount) {
            Ok(a) => a,
            Err(e) => {
                warn!("🔎️ [{}] {sig} has an unrepresentable amount. {e}", order.id);
                return None;
            },
        };
        let (classification, difference) = classify_payment(amount, order.amount_elurc, self.config.tolerance);
        Some(TransactionMatch {
            signature: sig.to_string(),
            amount,
            timestamp: block_time * 1000,
            classification,
            difference,
        })
    }
}
