use std::str::FromStr;

use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::ElurcAmount,
    solana::{
        instructions::{signed_transaction, token_transfer_instructions},
        send_and_confirm_transaction,
        ChainError,
        Keypair,
        Pubkey,
        RetryPolicy,
        Signer,
        SolanaRpc,
    },
};

/// The smallest refund, in token units, that is worth sending
pub const MIN_REFUND_AMOUNT: i64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundAmountCheck {
    pub valid: bool,
    pub error: Option<String>,
}

impl RefundAmountCheck {
    fn ok() -> Self {
        Self { valid: true, error: None }
    }

    fn rejected(error: String) -> Self {
        Self { valid: false, error: Some(error) }
    }
}

/// Checks a refund against the minimum refund amount and against what is left of the order total after the refunds
/// that have already completed.
pub fn validate_refund_amount(
    order_amount: ElurcAmount,
    refund_amount: ElurcAmount,
    previous_refunds: ElurcAmount,
) -> RefundAmountCheck {
    validate_refund_amount_with_minimum(order_amount, refund_amount, previous_refunds, MIN_REFUND_AMOUNT.into())
}

pub fn validate_refund_amount_with_minimum(
    order_amount: ElurcAmount,
    refund_amount: ElurcAmount,
    previous_refunds: ElurcAmount,
    minimum: ElurcAmount,
) -> RefundAmountCheck {
    if refund_amount < minimum {
        return RefundAmountCheck::rejected(format!(
            "Refund amount must be at least {} units (got {})",
            minimum.value(),
            refund_amount.value()
        ));
    }
    if previous_refunds + refund_amount > order_amount {
        return RefundAmountCheck::rejected(format!(
            "Total refunds of {} exceeds order amount of {} ({} already refunded)",
            (previous_refunds + refund_amount).value(),
            order_amount.value(),
            previous_refunds.value()
        ));
    }
    RefundAmountCheck::ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub success: bool,
    pub signature: Option<String>,
    pub error: Option<String>,
    /// The transfer was submitted but neither confirmed nor rejected. It may still land, so the refund must not be
    /// treated as failed.
    pub pending: bool,
}

impl RefundOutcome {
    fn confirmed(signature: String) -> Self {
        Self { success: true, signature: Some(signature), error: None, pending: false }
    }

    fn failed(error: String) -> Self {
        Self { success: false, signature: None, error: Some(error), pending: false }
    }

    fn unconfirmed(signature: String, error: String) -> Self {
        Self { success: false, signature: Some(signature), error: Some(error), pending: true }
    }
}

#[derive(Debug, Error)]
enum ExecutionError {
    #[error("Invalid refund address. {0}")]
    Address(String),
    #[error("Invalid refund amount. {0}")]
    Amount(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Sends refunds from the shop's token account.
///
/// Callers must have validated the amount and persisted the refund as `processing` before calling
/// [`RefundExecutor::execute_refund`].
pub struct RefundExecutor<'a, C> {
    rpc: &'a C,
    retry: RetryPolicy,
}

impl<'a, C> RefundExecutor<'a, C>
where C: SolanaRpc
{
    pub fn new(rpc: &'a C) -> Self {
        Self { rpc, retry: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Transfers `amount` of `token_mint` from the shop wallet's token account to the recipient's token account,
    /// creating the latter if it does not exist yet. Failures are reported in the outcome, never returned as errors.
    ///
    /// A transfer that was submitted but not confirmed within the retry policy comes back with `pending` set.
    pub async fn execute_refund(
        &self,
        recipient_wallet: &str,
        amount: ElurcAmount,
        shop_keypair: &Keypair,
        token_mint: &Pubkey,
    ) -> RefundOutcome {
        match self.send_refund(recipient_wallet, amount, shop_keypair, token_mint).await {
            Ok(signature) => {
                info!("💸️ Refund of {amount} to {recipient_wallet} confirmed in {signature}");
                RefundOutcome::confirmed(signature)
            },
            Err(ExecutionError::Chain(ChainError::NotConfirmed(signature))) => {
                error!(
                    "💸️ Refund of {amount} to {recipient_wallet} was submitted as {signature} but is not confirmed. It \
                     may still land."
                );
                let error = ChainError::NotConfirmed(signature.clone()).to_string();
                RefundOutcome::unconfirmed(signature, error)
            },
            Err(e) => {
                warn!("💸️ Refund of {amount} to {recipient_wallet} failed. {e}");
                RefundOutcome::failed(e.to_string())
            },
        }
    }

    async fn send_refund(
        &self,
        recipient_wallet: &str,
        amount: ElurcAmount,
        shop_keypair: &Keypair,
        token_mint: &Pubkey,
    ) -> Result<String, ExecutionError> {
        let recipient = Pubkey::from_str(recipient_wallet).map_err(|e| ExecutionError::Address(e.to_string()))?;
        let raw_amount = u64::try_from(amount).map_err(|e| ExecutionError::Amount(e.to_string()))?;
        if raw_amount == 0 {
            return Err(ExecutionError::Amount("Refund amount must be positive".into()));
        }
        let instructions = token_transfer_instructions(&shop_keypair.pubkey(), &recipient, token_mint, raw_amount)?;
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let transaction = signed_transaction(&instructions, shop_keypair, blockhash)?;
        debug!("💸️ Sending refund {} of {amount} to {recipient}", transaction.signatures[0]);
        let signature = send_and_confirm_transaction(self.rpc, &transaction, self.retry).await?;
        Ok(signature)
    }
}
