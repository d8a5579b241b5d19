//! Data types shared between the storage backends, the payment flows and the HTTP layer.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use elurc_common::{ElurcAmount, EurCents};
use log::error;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    pub kind: &'static str,
    pub value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Generates `FromStr`, `Display` and a lenient `From<String>` for the simple string enums stored in the database.
macro_rules! string_enum {
    ($name:ident, $kind:literal, $default:ident, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    s => Err(ConversionError::new($kind, s)),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                value.parse().unwrap_or_else(|_| {
                    error!("Invalid {}: {value}. Defaulting to {}", $kind, Self::$default);
                    Self::$default
                })
            }
        }
    };
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The opaque, system-assigned identifier for an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Creates a fresh random order id
    pub fn random() -> Self {
        let bytes: [u8; 12] = rand::thread_rng().gen();
        let hex = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Checkout is complete, but no payment has been seen on-chain yet.
    Pending,
    /// A payment matching the order was found and validated.
    Paid,
    /// The payment exceeded the order total by more than the tolerance.
    Overpaid,
    /// The payment fell short of the order total by more than the tolerance.
    Underpaid,
    /// An admin is preparing the order for shipping.
    Processing,
    /// The order has shipped. Terminal.
    Fulfilled,
    /// The order was cancelled by an admin. Terminal.
    Cancelled,
    /// No payment arrived within the payment window. Terminal.
    Timeout,
}

string_enum!(OrderStatusType, "order status", Pending, {
    Pending => "pending",
    Paid => "paid",
    Overpaid => "overpaid",
    Underpaid => "underpaid",
    Processing => "processing",
    Fulfilled => "fulfilled",
    Cancelled => "cancelled",
    Timeout => "timeout",
});

impl OrderStatusType {
    /// True once a payment has been received for the order, regardless of what happened to it since.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Paid | Self::Overpaid | Self::Underpaid | Self::Processing | Self::Fulfilled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Cancelled | Self::Timeout)
    }
}

//--------------------------------------      ChangedBy        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChangedBy {
    System,
    Admin,
}

string_enum!(ChangedBy, "status actor", System, {
    System => "system",
    Admin => "admin",
});

//--------------------------------------  StatusHistoryEntry   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatusType,
    pub timestamp: DateTime<Utc>,
    pub changed_by: ChangedBy,
    pub reason: Option<String>,
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
/// Prices at the time the order was placed. These are never re-read from the live product catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub elurc: ElurcAmount,
    pub eur: EurCents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: u32,
    pub price_snapshot: PriceSnapshot,
}

impl OrderItem {
    pub fn new<S: Into<String>>(product_id: S, quantity: u32, elurc: ElurcAmount, eur: EurCents) -> Self {
        Self { product_id: product_id.into(), quantity, price_snapshot: PriceSnapshot { elurc, eur } }
    }
}

//--------------------------------------  PaymentDiscrepancy   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    Overpayment,
    Underpayment,
    None,
}

string_enum!(DiscrepancyType, "discrepancy type", None, {
    Overpayment => "overpayment",
    Underpayment => "underpayment",
    None => "none",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyResolution {
    Pending,
    RefundInitiated,
    RefundCompleted,
    ManuallyApproved,
    Cancelled,
}

string_enum!(DiscrepancyResolution, "discrepancy resolution", Pending, {
    Pending => "pending",
    RefundInitiated => "refund_initiated",
    RefundCompleted => "refund_completed",
    ManuallyApproved => "manually_approved",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDiscrepancy {
    pub has_discrepancy: bool,
    pub discrepancy_type: DiscrepancyType,
    /// Actual minus expected. Positive values mean the customer overpaid.
    pub difference_amount: ElurcAmount,
    pub detected_at: DateTime<Utc>,
    pub resolution: DiscrepancyResolution,
    pub notes: Option<String>,
}

impl PaymentDiscrepancy {
    pub fn detected(difference_amount: ElurcAmount, discrepancy_type: DiscrepancyType) -> Self {
        Self {
            has_discrepancy: discrepancy_type != DiscrepancyType::None,
            discrepancy_type,
            difference_amount,
            detected_at: Utc::now(),
            resolution: DiscrepancyResolution::Pending,
            notes: None,
        }
    }
}

//--------------------------------------      RefundInfo       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundInfo {
    pub amount: ElurcAmount,
    pub wallet_address: String,
    pub transaction_signature: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reason: String,
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    /// Expected payment in the smallest token unit. Immutable after creation.
    pub amount_elurc: ElurcAmount,
    pub amount_eur: EurCents,
    pub customer_wallet: String,
    pub customer_email: String,
    pub status: OrderStatusType,
    pub transaction_signature: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub payment_discrepancy: Option<PaymentDiscrepancy>,
    pub refund_info: Option<RefundInfo>,
    pub items: Vec<OrderItem>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub amount_elurc: ElurcAmount,
    pub amount_eur: EurCents,
    pub customer_wallet: String,
    pub customer_email: String,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(order_number: S, amount_elurc: ElurcAmount, customer_wallet: S) -> Self {
        Self {
            order_number: order_number.into(),
            amount_elurc,
            amount_eur: EurCents::default(),
            customer_wallet: customer_wallet.into(),
            customer_email: String::default(),
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.customer_email = email.into();
        self
    }

    pub fn with_eur(mut self, amount_eur: EurCents) -> Self {
        self.amount_eur = amount_eur;
        self
    }

    pub fn with_item(mut self, item: OrderItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

//--------------------------------------  OrderStatusUpdate    ---------------------------------------------------------
/// A single status mutation. Every applied update results in exactly one status history entry.
#[derive(Debug, Clone)]
pub struct OrderStatusUpdate {
    pub new_status: OrderStatusType,
    pub changed_by: ChangedBy,
    pub reason: Option<String>,
    pub transaction_signature: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl OrderStatusUpdate {
    pub fn new(new_status: OrderStatusType, changed_by: ChangedBy) -> Self {
        Self { new_status, changed_by, reason: None, transaction_signature: None, paid_at: None }
    }

    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_payment<S: Into<String>>(mut self, signature: S, paid_at: DateTime<Utc>) -> Self {
        self.transaction_signature = Some(signature.into());
        self.paid_at = Some(paid_at);
        self
    }
}

//--------------------------------------     RefundStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

string_enum!(RefundStatus, "refund status", Pending, {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

impl RefundStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

//--------------------------------------        Refund         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Refund {
    pub id: i64,
    pub refund_number: String,
    pub order_id: OrderId,
    pub amount: ElurcAmount,
    pub wallet_address: String,
    pub reason: String,
    pub admin_notes: Option<String>,
    pub status: RefundStatus,
    pub transaction_signature: Option<String>,
    pub error_message: Option<String>,
    pub initiated_by: Option<String>,
    pub source_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefund {
    pub refund_number: String,
    pub order_id: OrderId,
    pub amount: ElurcAmount,
    pub wallet_address: String,
    pub reason: String,
    pub admin_notes: Option<String>,
    pub initiated_by: Option<String>,
    pub source_ip: Option<String>,
}

impl NewRefund {
    pub fn new<S: Into<String>>(order_id: OrderId, amount: ElurcAmount, wallet_address: S, reason: S) -> Self {
        Self {
            refund_number: new_refund_number(),
            order_id,
            amount,
            wallet_address: wallet_address.into(),
            reason: reason.into(),
            admin_notes: None,
            initiated_by: None,
            source_ip: None,
        }
    }
}

/// Refund numbers look like `REF-1718000000000-3fa2`. The millisecond timestamp keeps them time-ordered; the random
/// suffix separates refunds created in the same millisecond.
pub fn new_refund_number() -> String {
    let suffix: u16 = rand::thread_rng().gen();
    format!("REF-{}-{suffix:04x}", Utc::now().timestamp_millis())
}
