use log::trace;
use serde_json::Value;

use crate::solana::{
    parsed::{token_balance_owner, DecodedInstruction},
    ParsedTransaction,
    ParsedTransactionExt,
};

/// The token movement described by the first SPL token transfer in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    /// The wallet that signed for the transfer, i.e. the payer
    pub source_authority: String,
    pub source_account: String,
    pub destination_account: String,
    /// The owner of `destination_account`, from the post-transfer token balances
    pub destination_owner: Option<String>,
    pub mint: Option<String>,
    /// Raw amount in the smallest token unit
    pub amount: u64,
}

fn is_token_transfer(ix: &DecodedInstruction<'_>) -> bool {
    let is_token_program = ix.program == "spl-token" || ix.program_id == spl_token::ID.to_string();
    is_token_program && matches!(ix.instruction_type(), Some("transfer" | "transferChecked"))
}

fn str_field<'a>(info: &'a Value, key: &str) -> Option<&'a str> {
    info.get(key).and_then(Value::as_str)
}

/// Locates the first `transfer` or `transferChecked` instruction of the SPL token program, looking at top-level
/// instructions before inner ones, and resolves its mint and destination owner.
///
/// Returns `None` if there is no such instruction or it cannot be parsed. Failed transactions are parsed too; it is
/// up to the callers to reject them.
pub fn extract_token_transfer(tx: &ParsedTransaction) -> Option<TokenTransfer> {
    let ix = tx.decoded_instructions().into_iter().find(is_token_transfer)?;
    let info = ix.info()?;
    let source_account = str_field(info, "source")?.to_string();
    let destination_account = str_field(info, "destination")?.to_string();
    let source_authority =
        str_field(info, "authority").or_else(|| str_field(info, "multisigAuthority"))?.to_string();
    let amount = str_field(info, "amount")
        .or_else(|| info.get("tokenAmount").and_then(|t| str_field(t, "amount")))
        .and_then(|a| a.parse::<u64>().ok())?;

    let balance_for = |account: &str| {
        tx.post_token_balances().iter().find(|b| tx.account_key(usize::from(b.account_index)) == Some(account))
    };
    let destination_balance = balance_for(&destination_account);
    let destination_owner = destination_balance.and_then(token_balance_owner).map(String::from);
    let mint = str_field(info, "mint")
        .map(String::from)
        .or_else(|| destination_balance.map(|b| b.mint.clone()))
        .or_else(|| balance_for(&source_account).map(|b| b.mint.clone()));
    trace!(
        "🔎️ Transfer of {amount} from {source_authority} to {destination_account} (owner {destination_owner:?}, mint \
         {mint:?})"
    );
    Some(TokenTransfer { source_authority, source_account, destination_account, destination_owner, mint, amount })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

    fn balance(index: u8, owner: &str, amount: &str) -> Value {
        json!({
            "accountIndex": index, "mint": "Mint111", "owner": owner,
            "uiTokenAmount": {"amount": amount, "decimals": 9, "uiAmount": null, "uiAmountString": "0"}
        })
    }

    fn tx_with(instructions: Value, inner: Value) -> ParsedTransaction {
        serde_json::from_value(json!({
            "slot": 270_000_000u64,
            "blockTime": 1_718_000_030,
            "meta": {
                "err": null,
                "status": {"Ok": null},
                "fee": 5000,
                "preBalances": [],
                "postBalances": [],
                "innerInstructions": inner,
                "postTokenBalances": [balance(1, "Cust123", "0"), balance(2, "Shop111", "10000000")]
            },
            "transaction": {
                "signatures": ["Sig111"],
                "message": {
                    "recentBlockhash": "11111111111111111111111111111111",
                    "accountKeys": [
                        {"pubkey": "Cust123", "signer": true, "writable": true},
                        {"pubkey": "CustAta", "signer": false, "writable": true},
                        {"pubkey": "ShopAta", "signer": false, "writable": true}
                    ],
                    "instructions": instructions
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn plain_transfer() {
        let tx = tx_with(
            json!([{
                "program": "spl-token", "programId": TOKEN_PROGRAM,
                "parsed": {"type": "transfer", "info": {"source": "CustAta", "destination": "ShopAta", "authority": "Cust123", "amount": "10000000"}}
            }]),
            json!([]),
        );
        let transfer = extract_token_transfer(&tx).unwrap();
        assert_eq!(transfer.amount, 10_000_000);
        assert_eq!(transfer.source_authority, "Cust123");
        assert_eq!(transfer.destination_owner.as_deref(), Some("Shop111"));
        assert_eq!(transfer.mint.as_deref(), Some("Mint111"));
    }

    #[test]
    fn transfer_checked_in_inner_instructions() {
        let tx = tx_with(
            json!([{"programId": "ComputeBudget111111111111111111111111111111", "accounts": [], "data": "3Bxs"}]),
            json!([{"index": 0, "instructions": [{
                "program": "spl-token", "programId": TOKEN_PROGRAM,
                "parsed": {"type": "transferChecked", "info": {
                    "source": "CustAta", "destination": "ShopAta", "authority": "Cust123", "mint": "OtherMint",
                    "tokenAmount": {"amount": "42", "decimals": 9}
                }}
            }]}]),
        );
        let transfer = extract_token_transfer(&tx).unwrap();
        assert_eq!(transfer.amount, 42);
        // The instruction's own mint wins over the balance snapshot
        assert_eq!(transfer.mint.as_deref(), Some("OtherMint"));
    }

    #[test]
    fn no_transfer() {
        let tx = tx_with(
            json!([{
                "program": "spl-token", "programId": TOKEN_PROGRAM,
                "parsed": {"type": "approve", "info": {"source": "CustAta", "delegate": "X", "owner": "Cust123", "amount": "1"}}
            }]),
            json!(null),
        );
        assert!(extract_token_transfer(&tx).is_none());
    }
}
