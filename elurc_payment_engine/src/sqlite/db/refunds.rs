use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{ElurcAmount, NewRefund, OrderId, Refund, RefundStatus};

pub async fn insert_refund(
    refund: NewRefund,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Refund, sqlx::Error> {
    let refund: Refund = sqlx::query_as(
        r#"
            INSERT INTO refunds (
                refund_number,
                order_id,
                amount,
                wallet_address,
                reason,
                admin_notes,
                status,
                initiated_by,
                source_ip,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(refund.refund_number)
    .bind(refund.order_id.as_str())
    .bind(refund.amount.value())
    .bind(refund.wallet_address)
    .bind(refund.reason)
    .bind(refund.admin_notes)
    .bind(RefundStatus::Pending.as_str())
    .bind(refund.initiated_by)
    .bind(refund.source_ip)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Refund {} for {} created for order {}", refund.refund_number, refund.amount, refund.order_id);
    Ok(refund)
}

pub async fn fetch_refund(refund_number: &str, conn: &mut SqliteConnection) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM refunds WHERE refund_number = $1").bind(refund_number).fetch_optional(conn).await
}

pub async fn fetch_refunds_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Refund>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM refunds WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

pub async fn fetch_refunds_with_status(
    status: RefundStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<Refund>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM refunds WHERE status = $1 ORDER BY id ASC")
        .bind(status.as_str())
        .fetch_all(conn)
        .await
}

pub async fn count_in_flight(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM refunds WHERE order_id = $1 AND status IN ('pending', 'processing')")
        .bind(order_id.as_str())
        .fetch_one(conn)
        .await
}

pub async fn total_completed(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<ElurcAmount, sqlx::Error> {
    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM refunds WHERE order_id = $1 AND status = 'completed'")
            .bind(order_id.as_str())
            .fetch_one(conn)
            .await?;
    Ok(ElurcAmount::from(total))
}

/// `pending` → `processing`. Returns `None` if the refund was not `pending`.
pub async fn mark_processing(
    refund_number: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE refunds SET status = 'processing', processed_at = $1
            WHERE refund_number = $2 AND status = 'pending'
            RETURNING *
        "#,
    )
    .bind(now)
    .bind(refund_number)
    .fetch_optional(conn)
    .await
}

/// `processing` → `completed`. Returns `None` if the refund was not `processing`.
pub async fn mark_completed(
    refund_number: &str,
    signature: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE refunds SET status = 'completed', transaction_signature = $1, completed_at = $2
            WHERE refund_number = $3 AND status = 'processing'
            RETURNING *
        "#,
    )
    .bind(signature)
    .bind(now)
    .bind(refund_number)
    .fetch_optional(conn)
    .await
}

/// `pending` or `processing` → `failed`. Returns `None` if the refund had already finished.
pub async fn mark_failed(
    refund_number: &str,
    error: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE refunds SET status = 'failed', error_message = $1, failed_at = $2
            WHERE refund_number = $3 AND status IN ('pending', 'processing')
            RETURNING *
        "#,
    )
    .bind(error)
    .bind(now)
    .bind(refund_number)
    .fetch_optional(conn)
    .await
}
