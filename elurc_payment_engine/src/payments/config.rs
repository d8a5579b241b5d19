use chrono::Duration;

use crate::{
    db_types::ElurcAmount,
    solana::{get_associated_token_address, Pubkey},
};

pub const DEFAULT_PAYMENT_TOLERANCE: i64 = 9_000;
pub const DEFAULT_PAYMENT_WINDOW_MINS: i64 = 10;
pub const DEFAULT_VALIDATION_MAX_AGE_MINS: i64 = 15;
pub const DEFAULT_REFUND_MINIMUM: i64 = 1_000;
pub const DEFAULT_SIGNATURE_PAGE_SIZE: usize = 20;

/// Payment policy and the addresses that identify a valid payment.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// The mint of the payment token
    pub token_mint: Pubkey,
    /// The wallet that owns the shop's token account. Payments must land in an account owned by this wallet.
    pub shop_wallet: Pubkey,
    /// Payments within this many units of the order total count as exact
    pub tolerance: ElurcAmount,
    /// How long a pending order waits for its payment before timing out
    pub payment_window: Duration,
    /// Transactions older than this are rejected by the validator
    pub validation_max_age: Duration,
    pub refund_minimum: ElurcAmount,
    /// How many recent signatures to request from the chain per poll
    pub signature_page_size: usize,
}

impl PaymentConfig {
    pub fn new(token_mint: Pubkey, shop_wallet: Pubkey) -> Self {
        Self {
            token_mint,
            shop_wallet,
            tolerance: ElurcAmount::from(DEFAULT_PAYMENT_TOLERANCE),
            payment_window: Duration::minutes(DEFAULT_PAYMENT_WINDOW_MINS),
            validation_max_age: Duration::minutes(DEFAULT_VALIDATION_MAX_AGE_MINS),
            refund_minimum: ElurcAmount::from(DEFAULT_REFUND_MINIMUM),
            signature_page_size: DEFAULT_SIGNATURE_PAGE_SIZE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: ElurcAmount) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_payment_window(mut self, window: Duration) -> Self {
        self.payment_window = window;
        self
    }

    pub fn with_validation_max_age(mut self, max_age: Duration) -> Self {
        self.validation_max_age = max_age;
        self
    }

    pub fn with_refund_minimum(mut self, minimum: ElurcAmount) -> Self {
        self.refund_minimum = minimum;
        self
    }

    pub fn with_signature_page_size(mut self, size: usize) -> Self {
        self.signature_page_size = size;
        self
    }

    /// The shop's associated token account for the payment mint. Refunds are paid out of this account.
    pub fn shop_token_account(&self) -> Pubkey {
        get_associated_token_address(&self.shop_wallet, &self.token_mint)
    }
}
