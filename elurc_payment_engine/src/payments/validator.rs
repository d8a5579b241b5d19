use chrono::{DateTime, Duration, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use super::{extract_token_transfer, PaymentConfig};
use crate::{
    db_types::{ElurcAmount, Order, OrderId},
    solana::{parsed::is_confirmed, ParsedTransactionExt, SolanaRpc},
};

/// What a transaction must look like to settle an order.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub expected_amount: ElurcAmount,
    pub expected_sender: String,
    /// The wallet that must own the destination token account
    pub expected_recipient: String,
    pub expected_token_mint: String,
    pub order_created_at: DateTime<Utc>,
    pub tolerance: ElurcAmount,
    pub max_age: Duration,
    /// The order being settled. Only used to tag log lines.
    pub order_id: Option<OrderId>,
}

impl ValidationOptions {
    /// The strict options the payment monitor uses for `order`.
    pub fn for_order(order: &Order, config: &PaymentConfig) -> Self {
        Self {
            expected_amount: order.amount_elurc,
            expected_sender: order.customer_wallet.clone(),
            expected_recipient: config.shop_wallet.to_string(),
            expected_token_mint: config.token_mint.to_string(),
            order_created_at: order.created_at,
            tolerance: config.tolerance,
            max_age: config.validation_max_age,
            order_id: Some(order.id.clone()),
        }
    }

    fn log_tag(&self, signature: &str) -> String {
        match &self.order_id {
            Some(id) => format!("[{id}] {signature}"),
            None => signature.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationDetails {
    pub signature: String,
    pub confirmed: bool,
    pub confirmations: Option<usize>,
    pub amount: ElurcAmount,
    pub sender: String,
    pub recipient: Option<String>,
    pub token_mint: Option<String>,
    /// Seconds since the Unix epoch
    pub block_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub details: Option<ValidationDetails>,
}

impl ValidationResult {
    fn failed(error: String) -> Self {
        Self { valid: false, errors: vec![error], ..Default::default() }
    }
}

pub struct TransactionValidator<'a, C> {
    rpc: &'a C,
}

impl<'a, C> TransactionValidator<'a, C>
where C: SolanaRpc
{
    pub fn new(rpc: &'a C) -> Self {
        Self { rpc }
    }

    /// Checks that `signature` is a confirmed, successful transfer that satisfies `options`.
    ///
    /// Every check runs even after one has failed, so that the result lists every problem with the transaction.
    /// Only a missing transaction stops validation early, since there is nothing left to check. `now` is used for
    /// the age check.
    pub async fn validate_transaction(
        &self,
        signature: &str,
        options: &ValidationOptions,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        let tag = options.log_tag(signature);
        let tx = match self.rpc.get_parsed_transaction(signature).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                debug!("🛡️ {tag} not found");
                return ValidationResult::failed("Transaction not found on blockchain".into());
            },
            Err(e) => {
                warn!("🛡️ {tag} could not be fetched. {e}");
                return ValidationResult::failed(format!("Could not fetch transaction: {e}"));
            },
        };
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(err) = tx.execution_error() {
            errors.push(format!("Transaction failed on-chain: {err}"));
        }

        let (confirmed, confirmations) = match self.rpc.get_signature_status(signature).await {
            Ok(Some(status)) => {
                if is_confirmed(&status) {
                    (true, status.confirmations)
                } else {
                    let level = status
                        .confirmation_status
                        .as_ref()
                        .map(|s| format!("{s:?}"))
                        .unwrap_or_else(|| "unknown".into());
                    errors.push(format!("Transaction is not confirmed (status: {level})"));
                    (false, status.confirmations)
                }
            },
            Ok(None) => {
                errors.push("Transaction status is not available".into());
                (false, None)
            },
            Err(e) => {
                errors.push(format!("Could not fetch confirmation status: {e}"));
                (false, None)
            },
        };

        let transfer = extract_token_transfer(&tx);
        let details = match &transfer {
            None => {
                errors.push("No valid token transfer found".into());
                None
            },
            Some(t) => {
                let amount = ElurcAmount::try_from(t.amount).unwrap_or_else(|e| {
                    errors.push(format!("Invalid transfer amount: {e}"));
                    ElurcAmount::from(0)
                });
                if t.mint.as_deref() != Some(options.expected_token_mint.as_str()) {
                    errors.push(format!(
                        "Token mint mismatch: expected {}, got {}",
                        options.expected_token_mint,
                        t.mint.as_deref().unwrap_or("unknown")
                    ));
                }
                let diff = amount - options.expected_amount;
                if diff.abs() > options.tolerance {
                    errors.push(format!(
                        "Amount mismatch: expected {}, got {} (difference {}, tolerance {})",
                        options.expected_amount.value(),
                        amount.value(),
                        diff.value(),
                        options.tolerance.value()
                    ));
                } else if diff.value() != 0 {
                    warnings.push(format!("Amount differs from the expected amount by {} units", diff.value()));
                }
                if t.source_authority != options.expected_sender {
                    errors.push(format!(
                        "Sender mismatch: expected {}, got {}",
                        options.expected_sender, t.source_authority
                    ));
                }
                if t.destination_owner.as_deref() != Some(options.expected_recipient.as_str()) {
                    errors.push(format!(
                        "Recipient mismatch: expected {}, got {}",
                        options.expected_recipient,
                        t.destination_owner.as_deref().unwrap_or("unknown")
                    ));
                }
                Some(ValidationDetails {
                    signature: signature.to_string(),
                    confirmed,
                    confirmations,
                    amount,
                    sender: t.source_authority.clone(),
                    recipient: t.destination_owner.clone(),
                    token_mint: t.mint.clone(),
                    block_time: tx.block_time,
                })
            },
        };

        match tx.block_time {
            None => errors.push("Transaction has no block time".into()),
            Some(block_time) => {
                let block_ms = block_time * 1000;
                if block_ms < options.order_created_at.timestamp_millis() {
                    errors.push(format!(
                        "Transaction predates the order (block time {block_time}, order created {})",
                        options.order_created_at.to_rfc3339()
                    ));
                }
                let age = now.timestamp_millis() - block_ms;
                if age > options.max_age.num_milliseconds() {
                    errors.push(format!(
                        "Transaction is too old: {} minutes (maximum {})",
                        age / 60_000,
                        options.max_age.num_minutes()
                    ));
                }
            },
        }

        let valid = errors.is_empty();
        if valid {
            debug!("🛡️ {tag} is valid");
        } else {
            info!("🛡️ {tag} failed validation: {}", errors.join("; "));
        }
        ValidationResult { valid, errors, warnings, details }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn options(order_id: Option<OrderId>) -> ValidationOptions {
        ValidationOptions {
            expected_amount: ElurcAmount::from(10_000_000),
            expected_sender: "Cust123".into(),
            expected_recipient: "Shop111".into(),
            expected_token_mint: "Mint111".into(),
            order_created_at: Utc::now(),
            tolerance: ElurcAmount::from(9_000),
            max_age: Duration::minutes(15),
            order_id,
        }
    }

    #[test]
    fn log_lines_name_the_order() {
        assert_eq!(options(Some(OrderId::from("ord-7".to_string()))).log_tag("5ig"), "[ord-7] 5ig");
        assert_eq!(options(None).log_tag("5ig"), "5ig");
    }
}
