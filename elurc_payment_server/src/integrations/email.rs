use std::time::Duration;

use elurc_payment_engine::{
    db_types::Order,
    events::{EventHandlers, EventHooks, RefundCompletedEvent, RefundFailedEvent},
};
use futures::future::BoxFuture;
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

pub const EMAIL_EVENT_BUFFER_SIZE: usize = 25;
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(15);

/// The body POSTed to the email webhook when an order is paid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaidNotification {
    pub order_id: String,
    pub order_number: String,
    pub customer_email: String,
    pub transaction_signature: Option<String>,
}

impl From<&Order> for OrderPaidNotification {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.to_string(),
            order_number: order.order_number.clone(),
            customer_email: order.customer_email.clone(),
            transaction_signature: order.transaction_signature.clone(),
        }
    }
}

/// Assigns the notification event handlers.
///
/// 1. OrderPaidEvent - the payment confirmation email is requested from the webhook, if one is configured. Failures
///    are logged and never retried; the payment itself is already committed.
/// 2. RefundCompletedEvent and RefundFailedEvent - logged for the operators.
pub fn create_email_event_handlers(webhook_url: Option<String>) -> Result<EventHandlers, ServerError> {
    let mut hooks = EventHooks::default();
    if let Some(url) = webhook_url {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| ServerError::InitializeError(format!("Could not create the webhook client. {e}")))?;
        // --- On OrderPaid Handler ---
        hooks.on_order_paid(move |ev| {
            let notification = OrderPaidNotification::from(&ev.order);
            if notification.customer_email.is_empty() {
                debug!("📧️ Order {} has no customer email. No confirmation will be sent.", notification.order_id);
                return no_op();
            }
            let client = client.clone();
            let url = url.clone();
            Box::pin(async move { send_notification(&client, &url, &notification).await })
        });
    }
    // --- Refund handlers ---
    hooks.on_refund_completed(|ev| {
        let RefundCompletedEvent { order, refund } = ev;
        info!(
            "📧️ Refund {} of {} for order {} was sent in {}",
            refund.refund_number,
            refund.amount,
            order.order_number,
            refund.transaction_signature.as_deref().unwrap_or("an unknown transaction")
        );
        no_op()
    });
    hooks.on_refund_failed(|ev| {
        let RefundFailedEvent { order_id, refund } = ev;
        warn!(
            "📧️ Refund {} for order {order_id} failed. {}",
            refund.refund_number,
            refund.error_message.as_deref().unwrap_or("No error message")
        );
        no_op()
    });
    Ok(EventHandlers::new(EMAIL_EVENT_BUFFER_SIZE, hooks))
}

async fn send_notification(client: &Client, url: &str, notification: &OrderPaidNotification) {
    let order_id = &notification.order_id;
    match client.post(url).json(notification).send().await {
        Ok(res) if res.status().is_success() => {
            info!("📧️ Payment confirmation for order {order_id} sent to {}", notification.customer_email)
        },
        Ok(res) => {
            warn!("📧️ The email webhook rejected the confirmation for order {order_id}. Status {}", res.status())
        },
        Err(e) => warn!("📧️ Could not send the payment confirmation for order {order_id}. {e}"),
    }
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
