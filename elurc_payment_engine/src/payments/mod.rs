//! # Payment reconciliation
//!
//! The flows that tie orders in the database to token transfers on-chain:
//!
//! * [`TransactionMatcher`] scans a wallet's recent signatures for the transfer that pays for an order.
//! * [`TransactionValidator`] re-verifies a single signature from first principles.
//! * [`PaymentMonitor`] drives a pending order through matching, validation and commit, or into `timeout`.
//! * [`RefundExecutor`] sends compensating transfers from the shop wallet.
//! * [`check_transition`] encodes the legal order status transitions.
mod config;
mod matcher;
mod monitor;
mod order_state;
mod refunds;
mod transfer;
mod validator;

pub use config::{
    PaymentConfig,
    DEFAULT_PAYMENT_TOLERANCE,
    DEFAULT_PAYMENT_WINDOW_MINS,
    DEFAULT_REFUND_MINIMUM,
    DEFAULT_SIGNATURE_PAGE_SIZE,
    DEFAULT_VALIDATION_MAX_AGE_MINS,
};
pub use matcher::{classify_payment, PaymentClassification, TransactionMatch, TransactionMatcher};
pub use monitor::{Clock, PaymentCheckStatus, PaymentMonitor, PaymentStatusResult};
pub use order_state::{check_transition, legal_transitions, OrderStatusTransitionError};
pub use refunds::{
    validate_refund_amount,
    validate_refund_amount_with_minimum,
    RefundAmountCheck,
    RefundExecutor,
    RefundOutcome,
    MIN_REFUND_AMOUNT,
};
pub use transfer::{extract_token_transfer, TokenTransfer};
pub use validator::{TransactionValidator, ValidationDetails, ValidationOptions, ValidationResult};
