//! # Solana access
//!
//! The payment flows talk to the chain through the [`SolanaRpc`] trait. [`SolanaRpcClient`] implements it on top of
//! the nonblocking `solana-client` RPC client; tests use `test_utils::fake_chain::FakeChain` instead.
//!
//! * [`parsed`] gives read access to `jsonParsed` transactions and signature statuses.
//! * [`instructions`] builds the SPL token transfer used for refunds.
//! * [`keys`] loads the shop keypair from the JSON byte-array format written by `solana-keygen`.
mod errors;
pub mod instructions;
pub mod keys;
pub mod parsed;
mod rpc;

pub use errors::{ChainError, SolanaKeyError};
pub use parsed::{ParsedTransaction, ParsedTransactionExt, SignatureInfo, SignatureStatus};
pub use rpc::{send_and_confirm_transaction, RetryPolicy, SolanaRpc, SolanaRpcClient};
pub use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
pub use spl_associated_token_account::get_associated_token_address;
