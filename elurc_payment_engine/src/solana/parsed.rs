//! Read access to the `jsonParsed` transactions and signature statuses returned by the RPC node.
use serde_json::Value;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::{commitment_config::CommitmentConfig, transaction::TransactionError};
use solana_transaction_status::{
    option_serializer::OptionSerializer,
    EncodedConfirmedTransactionWithStatusMeta,
    EncodedTransaction,
    TransactionStatus,
    UiInstruction,
    UiMessage,
    UiParsedInstruction,
    UiTransactionTokenBalance,
};

/// A transaction fetched with `jsonParsed` encoding
pub type ParsedTransaction = EncodedConfirmedTransactionWithStatusMeta;
/// An entry in the `getSignaturesForAddress` result. Newest first.
pub type SignatureInfo = RpcConfirmedTransactionStatusWithSignature;
/// An entry in the `getSignatureStatuses` result
pub type SignatureStatus = TransactionStatus;

/// An instruction the node was able to decode, from the top level or from a CPI
#[derive(Debug, Clone, Copy)]
pub struct DecodedInstruction<'a> {
    pub program: &'a str,
    pub program_id: &'a str,
    pub parsed: &'a Value,
}

impl<'a> DecodedInstruction<'a> {
    /// The `type` field of the parsed payload, e.g. `transfer`
    pub fn instruction_type(&self) -> Option<&'a str> {
        self.parsed.get("type").and_then(Value::as_str)
    }

    pub fn info(&self) -> Option<&'a Value> {
        self.parsed.get("info")
    }
}

pub trait ParsedTransactionExt {
    /// The execution error recorded by the runtime, if the transaction failed.
    fn execution_error(&self) -> Option<&TransactionError>;

    fn signature(&self) -> Option<&str>;

    fn account_key(&self, index: usize) -> Option<&str>;

    fn post_token_balances(&self) -> &[UiTransactionTokenBalance];

    /// Decoded top-level instructions first, then decoded inner (CPI) instructions in execution order.
    fn decoded_instructions(&self) -> Vec<DecodedInstruction<'_>>;
}

fn present<T>(value: &OptionSerializer<T>) -> Option<&T> {
    match value {
        OptionSerializer::Some(v) => Some(v),
        _ => None,
    }
}

fn decoded(ix: &UiInstruction) -> Option<DecodedInstruction<'_>> {
    match ix {
        UiInstruction::Parsed(UiParsedInstruction::Parsed(p)) => {
            Some(DecodedInstruction { program: &p.program, program_id: &p.program_id, parsed: &p.parsed })
        },
        _ => None,
    }
}

impl ParsedTransactionExt for ParsedTransaction {
    fn execution_error(&self) -> Option<&TransactionError> {
        self.transaction.meta.as_ref().and_then(|m| m.err.as_ref())
    }

    fn signature(&self) -> Option<&str> {
        match &self.transaction.transaction {
            EncodedTransaction::Json(tx) => tx.signatures.first().map(String::as_str),
            _ => None,
        }
    }

    fn account_key(&self, index: usize) -> Option<&str> {
        match &self.transaction.transaction {
            EncodedTransaction::Json(tx) => match &tx.message {
                UiMessage::Parsed(m) => m.account_keys.get(index).map(|k| k.pubkey.as_str()),
                UiMessage::Raw(m) => m.account_keys.get(index).map(String::as_str),
            },
            _ => None,
        }
    }

    fn post_token_balances(&self) -> &[UiTransactionTokenBalance] {
        self.transaction
            .meta
            .as_ref()
            .and_then(|m| present(&m.post_token_balances))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn decoded_instructions(&self) -> Vec<DecodedInstruction<'_>> {
        let top_level = match &self.transaction.transaction {
            EncodedTransaction::Json(tx) => match &tx.message {
                UiMessage::Parsed(m) => m.instructions.as_slice(),
                UiMessage::Raw(_) => &[],
            },
            _ => &[],
        };
        let inner = self
            .transaction
            .meta
            .as_ref()
            .and_then(|m| present(&m.inner_instructions))
            .into_iter()
            .flatten()
            .flat_map(|i| i.instructions.iter());
        top_level.iter().chain(inner).filter_map(decoded).collect()
    }
}

/// The owner recorded for a token balance entry, if the node reported one
pub fn token_balance_owner(balance: &UiTransactionTokenBalance) -> Option<&str> {
    present(&balance.owner).map(String::as_str)
}

/// `confirmed` or `finalized`
pub fn is_confirmed(status: &SignatureStatus) -> bool {
    status.satisfies_commitment(CommitmentConfig::confirmed())
}
