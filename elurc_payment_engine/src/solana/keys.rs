//! Shop keypair loading. `solana-keygen` writes keypairs as a JSON array of the 64 keypair bytes (secret then
//! public); a bare 32-byte secret is accepted too.
use solana_sdk::signature::{keypair_from_seed, Keypair, Signer};

use super::SolanaKeyError;

const SECRET_LENGTH: usize = 32;
const KEYPAIR_LENGTH: usize = 64;

pub fn keypair_from_json(json: &str) -> Result<Keypair, SolanaKeyError> {
    let bytes = serde_json::from_str::<Vec<u8>>(json.trim())
        .map_err(|e| SolanaKeyError::MalformedKeypair(e.to_string()))?;
    let keypair = match bytes.len() {
        SECRET_LENGTH | KEYPAIR_LENGTH => keypair_from_seed(&bytes[..SECRET_LENGTH])
            .map_err(|e| SolanaKeyError::MalformedKeypair(e.to_string()))?,
        actual => return Err(SolanaKeyError::InvalidLength { expected: KEYPAIR_LENGTH, actual }),
    };
    if bytes.len() == KEYPAIR_LENGTH && keypair.pubkey().as_ref() != &bytes[SECRET_LENGTH..] {
        return Err(SolanaKeyError::KeypairMismatch);
    }
    Ok(keypair)
}

/// The inverse of [`keypair_from_json`], always in the 64-byte form
pub fn keypair_to_json(keypair: &Keypair) -> String {
    let bytes = keypair.to_bytes().iter().map(u8::to_string).collect::<Vec<_>>();
    format!("[{}]", bytes.join(","))
}
