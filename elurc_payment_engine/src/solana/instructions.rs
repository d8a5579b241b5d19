use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::Transaction,
};
use spl_associated_token_account::{
    get_associated_token_address,
    instruction::create_associated_token_account_idempotent,
};

use super::ChainError;

/// Moves `amount` of `mint` from the payer's associated token account to the recipient's, creating the recipient's
/// account first if it does not exist yet. The payer covers the fee and any rent.
pub fn token_transfer_instructions(
    payer: &Pubkey,
    recipient: &Pubkey,
    mint: &Pubkey,
    amount: u64,
) -> Result<Vec<Instruction>, ChainError> {
    let source = get_associated_token_address(payer, mint);
    let destination = get_associated_token_address(recipient, mint);
    let create = create_associated_token_account_idempotent(payer, recipient, mint, &spl_token::ID);
    let transfer = spl_token::instruction::transfer(&spl_token::ID, &source, &destination, payer, &[], amount)
        .map_err(|e| ChainError::InvalidTransaction(e.to_string()))?;
    Ok(vec![create, transfer])
}

/// Compiles and signs a transaction paid for by `payer`
pub fn signed_transaction(
    instructions: &[Instruction],
    payer: &Keypair,
    blockhash: Hash,
) -> Result<Transaction, ChainError> {
    let mut transaction = Transaction::new_with_payer(instructions, Some(&payer.pubkey()));
    transaction.try_sign(&[payer], blockhash).map_err(|e| ChainError::InvalidTransaction(e.to_string()))?;
    Ok(transaction)
}
