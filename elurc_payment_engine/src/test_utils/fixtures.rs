use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use solana_sdk::{
    instruction::InstructionError,
    signature::keypair_from_seed,
    transaction::TransactionError,
};
use solana_transaction_status::TransactionConfirmationStatus;

use crate::{
    payments::PaymentConfig,
    solana::{get_associated_token_address, Keypair, ParsedTransaction, Pubkey, SignatureInfo, SignatureStatus},
};

/// A deterministic, valid public key
pub fn test_pubkey(seed: u8) -> Pubkey {
    Pubkey::new_from_array([seed; 32])
}

/// A deterministic keypair whose secret is `seed` repeated
pub fn test_keypair(seed: u8) -> Keypair {
    keypair_from_seed(&[seed; 32]).expect("32 bytes is a valid seed")
}

pub fn test_mint() -> Pubkey {
    test_pubkey(201)
}

pub fn test_shop_wallet() -> Pubkey {
    test_pubkey(202)
}

pub fn test_config() -> PaymentConfig {
    PaymentConfig::new(test_mint(), test_shop_wallet())
}

fn ata(owner: &str, mint: &str) -> String {
    match (owner.parse::<Pubkey>(), mint.parse::<Pubkey>()) {
        (Ok(o), Ok(m)) => get_associated_token_address(&o, &m).to_string(),
        _ => format!("{owner}Ata"),
    }
}

/// Describes an SPL token transfer, and renders it as the `jsonParsed` transaction the RPC node would return.
#[derive(Debug, Clone)]
pub struct TransferFixture {
    pub signature: String,
    pub sender: String,
    /// The owner of the destination token account
    pub recipient: String,
    pub mint: String,
    pub amount: u64,
    pub block_time: Option<i64>,
    pub failed: bool,
    pub checked: bool,
}

impl TransferFixture {
    pub fn new(signature: &str, sender: &str, amount: u64, block_time: DateTime<Utc>) -> Self {
        Self {
            signature: signature.to_string(),
            sender: sender.to_string(),
            recipient: test_shop_wallet().to_string(),
            mint: test_mint().to_string(),
            amount,
            block_time: Some(block_time.timestamp()),
            failed: false,
            checked: false,
        }
    }

    pub fn to<S: Into<String>>(mut self, recipient: S) -> Self {
        self.recipient = recipient.into();
        self
    }

    pub fn with_mint<S: Into<String>>(mut self, mint: S) -> Self {
        self.mint = mint.into();
        self
    }

    pub fn without_block_time(mut self) -> Self {
        self.block_time = None;
        self
    }

    pub fn failed(mut self) -> Self {
        self.failed = true;
        self
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    pub fn to_json(&self) -> Value {
        let token_program = spl_token::ID.to_string();
        let source = ata(&self.sender, &self.mint);
        let destination = ata(&self.recipient, &self.mint);
        let info = if self.checked {
            json!({
                "source": source, "destination": destination, "authority": self.sender, "mint": self.mint,
                "tokenAmount": {"amount": self.amount.to_string(), "decimals": 9}
            })
        } else {
            json!({"source": source, "destination": destination, "authority": self.sender, "amount": self.amount.to_string()})
        };
        let kind = if self.checked { "transferChecked" } else { "transfer" };
        let (err, status) = if self.failed {
            let err = json!({"InstructionError": [0, {"Custom": 1}]});
            (err.clone(), json!({ "Err": err }))
        } else {
            (Value::Null, json!({ "Ok": null }))
        };
        let balance = |index: u8, owner: &str, amount: u64| {
            json!({
                "accountIndex": index,
                "mint": self.mint,
                "owner": owner,
                "programId": token_program,
                "uiTokenAmount": {
                    "amount": amount.to_string(), "decimals": 9, "uiAmount": null, "uiAmountString": amount.to_string()
                }
            })
        };
        json!({
            "slot": 270_000_000u64,
            "blockTime": self.block_time,
            "meta": {
                "err": err,
                "status": status,
                "fee": 5000,
                "preBalances": [],
                "postBalances": [],
                "innerInstructions": [],
                "preTokenBalances": [],
                "postTokenBalances": [balance(1, &self.sender, 0), balance(2, &self.recipient, self.amount)]
            },
            "transaction": {
                "signatures": [self.signature],
                "message": {
                    "recentBlockhash": "11111111111111111111111111111111",
                    "accountKeys": [
                        {"pubkey": self.sender, "signer": true, "writable": true},
                        {"pubkey": source, "signer": false, "writable": true},
                        {"pubkey": destination, "signer": false, "writable": true},
                        {"pubkey": token_program, "signer": false, "writable": false}
                    ],
                    "instructions": [{
                        "program": "spl-token",
                        "programId": token_program,
                        "parsed": {"type": kind, "info": info}
                    }]
                }
            }
        })
    }

    pub fn to_transaction(&self) -> ParsedTransaction {
        serde_json::from_value(self.to_json()).expect("Fixture is not a valid parsed transaction")
    }
}

/// A `getSignaturesForAddress` entry
pub fn signature_info(signature: &str, block_time: Option<i64>) -> SignatureInfo {
    SignatureInfo {
        signature: signature.to_string(),
        slot: 270_000_000,
        err: None,
        memo: None,
        block_time,
        confirmation_status: Some(TransactionConfirmationStatus::Confirmed),
    }
}

pub fn confirmed_status() -> SignatureStatus {
    SignatureStatus {
        slot: 270_000_000,
        confirmations: Some(12),
        status: Ok(()),
        err: None,
        confirmation_status: Some(TransactionConfirmationStatus::Confirmed),
    }
}

pub fn processed_status() -> SignatureStatus {
    SignatureStatus {
        slot: 270_000_000,
        confirmations: Some(0),
        status: Ok(()),
        err: None,
        confirmation_status: Some(TransactionConfirmationStatus::Processed),
    }
}

/// Confirmed, but the program returned custom error 1
pub fn failed_status() -> SignatureStatus {
    let err = TransactionError::InstructionError(0, InstructionError::Custom(1));
    SignatureStatus { status: Err(err.clone()), err: Some(err), ..confirmed_status() }
}
