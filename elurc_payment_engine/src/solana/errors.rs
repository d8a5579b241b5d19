use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    rpc_request::RpcError,
};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("Could not reach the Solana RPC node. {0}")]
    Transport(String),
    #[error("The RPC request timed out. {0}")]
    Timeout(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Could not decode the RPC response. {0}")]
    Decode(String),
    #[error("Transaction {0} was not confirmed in time")]
    NotConfirmed(String),
    #[error("Transaction {signature} failed on-chain: {reason}")]
    TransactionFailed { signature: String, reason: String },
    #[error("Invalid transaction. {0}")]
    InvalidTransaction(String),
    #[error("Invalid address or signature. {0}")]
    InvalidInput(String),
}

impl ChainError {
    /// True when a submission may have reached the cluster even though the call failed.
    pub fn may_have_landed(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::NotConfirmed(_))
    }
}

impl From<ClientError> for ChainError {
    fn from(e: ClientError) -> Self {
        match e.kind() {
            ClientErrorKind::Reqwest(re) if re.is_timeout() => Self::Timeout(e.to_string()),
            ClientErrorKind::Reqwest(_) | ClientErrorKind::Io(_) => Self::Transport(e.to_string()),
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                Self::Rpc { code: *code, message: message.clone() }
            },
            ClientErrorKind::SerdeJson(_) | ClientErrorKind::RpcError(RpcError::ParseError(_)) => {
                Self::Decode(e.to_string())
            },
            ClientErrorKind::TransactionError(te) => Self::InvalidTransaction(te.to_string()),
            ClientErrorKind::SigningError(se) => Self::InvalidTransaction(se.to_string()),
            _ => Self::Transport(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SolanaKeyError {
    #[error("Expected {expected} bytes, but got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("The keypair must be a JSON array of byte values. {0}")]
    MalformedKeypair(String),
    #[error("The public half of the keypair does not match its secret key")]
    KeypairMismatch,
}
