//! An in-memory stand-in for a Solana RPC node.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use super::fixtures::{confirmed_status, failed_status, signature_info, TransferFixture};
use crate::solana::{
    ChainError,
    Hash,
    ParsedTransaction,
    ParsedTransactionExt,
    SignatureInfo,
    SignatureStatus,
    Signature,
    SolanaRpc,
    Transaction,
};

/// What happens when a transaction is submitted
#[derive(Debug, Clone, Default)]
pub enum SendBehaviour {
    /// Accepted and immediately confirmed
    #[default]
    Confirm,
    /// Accepted, but never confirmed
    Drop,
    /// Accepted, then fails on-chain with a custom program error
    FailOnChain,
    /// Rejected by the node
    Reject(ChainError),
}

#[derive(Debug, Clone, Default)]
pub struct CallCounts {
    pub get_signatures_for_address: usize,
    pub get_parsed_transaction: usize,
    pub get_signature_status: usize,
    pub get_latest_blockhash: usize,
    pub send_transaction: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.get_signatures_for_address +
            self.get_parsed_transaction +
            self.get_signature_status +
            self.get_latest_blockhash +
            self.send_transaction
    }
}

#[derive(Debug, Default)]
struct ChainState {
    signatures: HashMap<String, Vec<SignatureInfo>>,
    transactions: HashMap<String, ParsedTransaction>,
    statuses: HashMap<String, SignatureStatus>,
    sent: Vec<Transaction>,
    send_behaviour: SendBehaviour,
    unavailable: bool,
    calls: CallCounts,
}

/// Scripted chain data with call counters. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a confirmed transfer. It is listed as the newest signature for the sender.
    pub fn add_transfer(&self, transfer: &TransferFixture) {
        self.add_transaction(&transfer.sender, transfer.to_transaction(), Some(confirmed_status()));
    }

    /// Adds a transaction, listing it as the newest signature for `address`.
    pub fn add_transaction(&self, address: &str, tx: ParsedTransaction, status: Option<SignatureStatus>) {
        let signature = tx.signature().unwrap_or_default().to_string();
        let mut state = self.state();
        let info = signature_info(&signature, tx.block_time);
        state.signatures.entry(address.to_string()).or_default().insert(0, info);
        if let Some(status) = status {
            state.statuses.insert(signature.clone(), status);
        }
        state.transactions.insert(signature, tx);
    }

    /// Lists a signature for `address` that the node cannot return a transaction for (yet)
    pub fn add_unindexed_signature(&self, address: &str, signature: &str, block_time: Option<i64>) {
        let mut state = self.state();
        state.signatures.entry(address.to_string()).or_default().insert(0, signature_info(signature, block_time));
    }

    pub fn set_status(&self, signature: &str, status: SignatureStatus) {
        self.state().statuses.insert(signature.to_string(), status);
    }

    pub fn set_send_behaviour(&self, behaviour: SendBehaviour) {
        self.state().send_behaviour = behaviour;
    }

    /// Every call fails with a transport error while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls.clone()
    }

    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.state().sent.clone()
    }

    fn check_available(state: &ChainState) -> Result<(), ChainError> {
        if state.unavailable {
            Err(ChainError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl SolanaRpc for FakeChain {
    async fn get_signatures_for_address(&self, address: &str, limit: usize) -> Result<Vec<SignatureInfo>, ChainError> {
        let mut state = self.state();
        state.calls.get_signatures_for_address += 1;
        Self::check_available(&state)?;
        let sigs = state.signatures.get(address).map(|s| s.iter().take(limit).cloned().collect()).unwrap_or_default();
        Ok(sigs)
    }

    async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>, ChainError> {
        let mut state = self.state();
        state.calls.get_parsed_transaction += 1;
        Self::check_available(&state)?;
        // `EncodedConfirmedTransactionWithStatusMeta` does not implement `Clone`; copy it via serde.
        let tx = state.transactions.get(signature).map(|tx| {
            serde_json::from_value(serde_json::to_value(tx).expect("serialize transaction"))
                .expect("deserialize transaction")
        });
        Ok(tx)
    }

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>, ChainError> {
        let mut state = self.state();
        state.calls.get_signature_status += 1;
        Self::check_available(&state)?;
        Ok(state.statuses.get(signature).cloned())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ChainError> {
        let mut state = self.state();
        state.calls.get_latest_blockhash += 1;
        Self::check_available(&state)?;
        // A fresh blockhash per call, so that every refund transaction gets its own signature
        Ok(Hash::new_from_array([state.calls.get_latest_blockhash as u8; 32]))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, ChainError> {
        let mut state = self.state();
        state.calls.send_transaction += 1;
        Self::check_available(&state)?;
        let signature = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| ChainError::InvalidTransaction("The transaction is not signed".into()))?;
        match state.send_behaviour.clone() {
            SendBehaviour::Reject(e) => return Err(e),
            SendBehaviour::Confirm => {
                state.statuses.insert(signature.to_string(), confirmed_status());
            },
            SendBehaviour::FailOnChain => {
                state.statuses.insert(signature.to_string(), failed_status());
            },
            SendBehaviour::Drop => {},
        }
        state.sent.push(transaction.clone());
        Ok(signature)
    }
}
