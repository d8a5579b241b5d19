use std::{str::FromStr, sync::Arc, time::Duration};

use log::*;
use serde_json::json;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_client::GetConfirmedSignaturesForAddress2Config,
    rpc_config::RpcTransactionConfig,
    rpc_request::RpcRequest,
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::UiTransactionEncoding;

use super::{
    parsed::{is_confirmed, ParsedTransaction, SignatureInfo, SignatureStatus},
    ChainError,
};

/// The chain operations needed to reconcile payments and issue refunds.
///
/// Addresses and signatures cross this boundary as the base58 strings that are stored with orders. All calls are
/// read-only except [`SolanaRpc::send_transaction`]. Implementations should apply their own network timeouts; the
/// payment window is enforced by the callers, not here.
#[allow(async_fn_in_trait)]
pub trait SolanaRpc {
    /// Recent signatures involving `address`, newest first, limited to `limit` entries.
    async fn get_signatures_for_address(&self, address: &str, limit: usize)
        -> Result<Vec<SignatureInfo>, ChainError>;

    /// The transaction in `jsonParsed` encoding, or `None` if the node has not indexed it (yet).
    async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>, ChainError>;

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>, ChainError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, ChainError>;

    /// Submits a signed transaction and returns its signature. Does not wait for confirmation.
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, ChainError>;
}

/// Bounds for [`send_and_confirm_transaction`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// The number of times the transaction is (re)submitted
    pub attempts: u32,
    /// The number of status polls after each submission
    pub confirmation_polls: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, confirmation_polls: 10, delay: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    pub fn immediate(attempts: u32, confirmation_polls: u32) -> Self {
        Self { attempts, confirmation_polls, delay: Duration::ZERO }
    }
}

/// Sends the transaction and waits until the cluster reports it as `confirmed` or `finalized`.
///
/// Resubmitting the same signed transaction is safe: the cluster deduplicates by signature, so a retry can never
/// result in a second transfer.
///
/// Once any submission may have reached the cluster, running out of attempts gives [`ChainError::NotConfirmed`]:
/// the transfer can still land until its blockhash expires, so callers must not treat it as a failure.
pub async fn send_and_confirm_transaction<C: SolanaRpc>(
    rpc: &C,
    transaction: &Transaction,
    policy: RetryPolicy,
) -> Result<String, ChainError> {
    let signature = transaction
        .signatures
        .first()
        .filter(|_| transaction.is_signed())
        .map(Signature::to_string)
        .ok_or_else(|| ChainError::InvalidTransaction("The transaction is not signed".into()))?;
    let mut last_error = ChainError::NotConfirmed(signature.clone());
    let mut submitted = false;
    for attempt in 1..=policy.attempts {
        if let Err(e) = rpc.send_transaction(transaction).await {
            warn!("📡️ Attempt {attempt}/{} to submit {signature} failed. {e}", policy.attempts);
            submitted |= e.may_have_landed();
            last_error = e;
            tokio::time::sleep(policy.delay).await;
            continue;
        }
        submitted = true;
        debug!("📡️ Transaction {signature} submitted (attempt {attempt}/{})", policy.attempts);
        for _ in 0..policy.confirmation_polls {
            match rpc.get_signature_status(&signature).await {
                Ok(Some(status)) if status.err.is_some() => {
                    let reason = status.err.map(|e| e.to_string()).unwrap_or_default();
                    return Err(ChainError::TransactionFailed { signature, reason });
                },
                Ok(Some(status)) if is_confirmed(&status) => {
                    info!("📡️ Transaction {signature} confirmed in slot {}", status.slot);
                    return Ok(signature);
                },
                Ok(_) => trace!("📡️ Transaction {signature} not confirmed yet"),
                Err(e) => debug!("📡️ Could not fetch the status of {signature}. {e}"),
            }
            tokio::time::sleep(policy.delay).await;
        }
    }
    if submitted {
        Err(ChainError::NotConfirmed(signature))
    } else {
        Err(last_error)
    }
}

fn parse_address(address: &str) -> Result<Pubkey, ChainError> {
    Pubkey::from_str(address).map_err(|e| ChainError::InvalidInput(format!("{address}: {e}")))
}

fn parse_signature(signature: &str) -> Result<Signature, ChainError> {
    Signature::from_str(signature).map_err(|e| ChainError::InvalidInput(format!("{signature}: {e}")))
}

/// [`SolanaRpc`] over the nonblocking `solana-client` RPC client, at `confirmed` commitment.
#[derive(Clone)]
pub struct SolanaRpcClient {
    url: String,
    client: Arc<RpcClient>,
}

impl std::fmt::Debug for SolanaRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SolanaRpcClient({})", self.url)
    }
}

impl SolanaRpcClient {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let client =
            RpcClient::new_with_timeout_and_commitment(url.to_string(), timeout, CommitmentConfig::confirmed());
        Self { url: url.to_string(), client: Arc::new(client) }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SolanaRpc for SolanaRpcClient {
    async fn get_signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, ChainError> {
        let address = parse_address(address)?;
        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(limit),
            commitment: Some(CommitmentConfig::confirmed()),
            ..Default::default()
        };
        trace!("📡️ getSignaturesForAddress {address} (limit {limit})");
        let signatures = self.client.get_signatures_for_address_with_config(&address, config).await?;
        Ok(signatures)
    }

    async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>, ChainError> {
        let signature = parse_signature(signature)?;
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        trace!("📡️ getTransaction {signature}");
        // The node answers `null` until it has indexed the transaction
        let tx = self
            .client
            .send::<Option<ParsedTransaction>>(RpcRequest::GetTransaction, json!([signature.to_string(), config]))
            .await?;
        Ok(tx)
    }

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>, ChainError> {
        let signature = parse_signature(signature)?;
        let statuses = self.client.get_signature_statuses_with_history(&[signature]).await?;
        Ok(statuses.value.into_iter().next().flatten())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ChainError> {
        let blockhash = self.client.get_latest_blockhash().await?;
        Ok(blockhash)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, ChainError> {
        let signature = self.client.send_transaction(transaction).await?;
        Ok(signature)
    }
}
