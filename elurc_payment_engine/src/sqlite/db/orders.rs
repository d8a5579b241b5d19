use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};

use crate::db_types::{
    ChangedBy,
    DiscrepancyResolution,
    DiscrepancyType,
    ElurcAmount,
    EurCents,
    NewOrder,
    Order,
    OrderId,
    OrderItem,
    OrderStatusType,
    OrderStatusUpdate,
    PaymentDiscrepancy,
    RefundInfo,
    StatusHistoryEntry,
};

/// The flattened `orders` row. Items and status history live in their own tables and are stitched back together in
/// [`fetch_order`].
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: OrderId,
    pub order_number: String,
    pub amount_elurc: ElurcAmount,
    pub amount_eur: EurCents,
    pub customer_wallet: String,
    pub customer_email: String,
    pub status: OrderStatusType,
    pub transaction_signature: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub discrepancy_type: Option<DiscrepancyType>,
    pub discrepancy_difference: Option<ElurcAmount>,
    pub discrepancy_detected_at: Option<DateTime<Utc>>,
    pub discrepancy_resolution: Option<DiscrepancyResolution>,
    pub discrepancy_notes: Option<String>,
    pub refund_amount: Option<ElurcAmount>,
    pub refund_wallet: Option<String>,
    pub refund_signature: Option<String>,
    pub refund_initiated_at: Option<DateTime<Utc>>,
    pub refund_completed_at: Option<DateTime<Utc>>,
    pub refund_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>, status_history: Vec<StatusHistoryEntry>) -> Order {
        let payment_discrepancy = match (self.discrepancy_type, self.discrepancy_detected_at) {
            (Some(discrepancy_type), Some(detected_at)) => Some(PaymentDiscrepancy {
                has_discrepancy: discrepancy_type != DiscrepancyType::None,
                discrepancy_type,
                difference_amount: self.discrepancy_difference.unwrap_or_default(),
                detected_at,
                resolution: self.discrepancy_resolution.unwrap_or(DiscrepancyResolution::Pending),
                notes: self.discrepancy_notes,
            }),
            _ => None,
        };
        let refund_info = match (self.refund_amount, self.refund_wallet, self.refund_initiated_at) {
            (Some(amount), Some(wallet_address), Some(initiated_at)) => Some(RefundInfo {
                amount,
                wallet_address,
                transaction_signature: self.refund_signature,
                initiated_at,
                completed_at: self.refund_completed_at,
                reason: self.refund_reason.unwrap_or_default(),
            }),
            _ => None,
        };
        Order {
            id: self.id,
            order_number: self.order_number,
            amount_elurc: self.amount_elurc,
            amount_eur: self.amount_eur,
            customer_wallet: self.customer_wallet,
            customer_email: self.customer_email,
            status: self.status,
            transaction_signature: self.transaction_signature,
            paid_at: self.paid_at,
            fulfilled_at: self.fulfilled_at,
            payment_discrepancy,
            refund_info,
            items,
            status_history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct ItemRow {
    product_id: String,
    quantity: i64,
    price_elurc: ElurcAmount,
    price_eur: EurCents,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        let quantity = u32::try_from(row.quantity).unwrap_or(u32::MAX);
        OrderItem::new(row.product_id, quantity, row.price_elurc, row.price_eur)
    }
}

/// Inserts a new order, its line items and the initial `pending` history entry. This is not atomic. Embed the call
/// inside a transaction and pass `&mut *tx` as the connection argument if you need atomicity.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<OrderId, sqlx::Error> {
    let id = OrderId::random();
    sqlx::query(
        r#"
            INSERT INTO orders (
                id,
                order_number,
                amount_elurc,
                amount_eur,
                customer_wallet,
                customer_email,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9);
        "#,
    )
    .bind(id.as_str())
    .bind(&order.order_number)
    .bind(order.amount_elurc.value())
    .bind(order.amount_eur.value())
    .bind(&order.customer_wallet)
    .bind(&order.customer_email)
    .bind(OrderStatusType::Pending.as_str())
    .bind(order.created_at)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;
    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, position, product_id, quantity, price_elurc, price_eur)
                VALUES ($1, $2, $3, $4, $5, $6);
            "#,
        )
        .bind(id.as_str())
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(i64::from(item.quantity))
        .bind(item.price_snapshot.elurc.value())
        .bind(item.price_snapshot.eur.value())
        .execute(&mut *conn)
        .await?;
    }
    insert_history(&id, OrderStatusType::Pending, ChangedBy::System, Some("Order created"), order.created_at, conn)
        .await?;
    debug!("🗃️ Order {id} ({}) inserted with {} items", order.order_number, order.items.len());
    Ok(id)
}

async fn insert_history(
    id: &OrderId,
    status: OrderStatusType,
    changed_by: ChangedBy,
    reason: Option<&str>,
    changed_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_status_history (order_id, status, changed_at, changed_by, reason) VALUES ($1, $2, $3, $4, \
         $5)",
    )
    .bind(id.as_str())
    .bind(status.as_str())
    .bind(changed_at)
    .bind(changed_by.as_str())
    .bind(reason)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_order_row(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await
}

/// Fetches the full order, including its items and status history (oldest entry first)
pub async fn fetch_order(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match fetch_order_row(id, &mut *conn).await? {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

pub async fn fetch_order_by_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

/// Orders in the given status, ordered by `created_at` in ascending order
pub async fn fetch_orders_with_status(
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let rows: Vec<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE status = $1 ORDER BY created_at ASC")
        .bind(status.as_str())
        .fetch_all(&mut *conn)
        .await?;
    trace!("🗃️ {} orders with status {status}", rows.len());
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(hydrate(row, &mut *conn).await?);
    }
    Ok(orders)
}

async fn hydrate(row: OrderRow, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let items: Vec<ItemRow> = sqlx::query_as(
        "SELECT product_id, quantity, price_elurc, price_eur FROM order_items WHERE order_id = $1 ORDER BY position",
    )
    .bind(row.id.as_str())
    .fetch_all(&mut *conn)
    .await?;
    let history: Vec<StatusHistoryEntry> = sqlx::query_as(
        r#"
            SELECT status, changed_at AS timestamp, changed_by, reason
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY id ASC
        "#,
    )
    .bind(row.id.as_str())
    .fetch_all(conn)
    .await?;
    let items = items.into_iter().map(OrderItem::from).collect();
    Ok(row.into_order(items, history))
}

/// Compare-and-swap on the order status. Returns `false` if the order is not currently in `expected`, in which case
/// nothing has been written.
///
/// `transaction_signature` and `paid_at` are only overwritten when the update carries them. `fulfilled_at` is only
/// ever stamped once.
pub async fn update_order_status(
    id: &OrderId,
    expected: OrderStatusType,
    update: &OrderStatusUpdate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let fulfilled_at = (update.new_status == OrderStatusType::Fulfilled).then_some(now);
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = $1,
                updated_at = $2,
                transaction_signature = COALESCE($3, transaction_signature),
                paid_at = COALESCE($4, paid_at),
                fulfilled_at = COALESCE(fulfilled_at, $5)
            WHERE id = $6 AND status = $7
        "#,
    )
    .bind(update.new_status.as_str())
    .bind(now)
    .bind(update.transaction_signature.as_deref())
    .bind(update.paid_at)
    .bind(fulfilled_at)
    .bind(id.as_str())
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        trace!("🗃️ Status CAS on {id} missed. Expected {expected}");
        return Ok(false);
    }
    insert_history(id, update.new_status, update.changed_by, update.reason.as_deref(), now, conn).await?;
    debug!("🗃️ Order {id} moved from {expected} to {}", update.new_status);
    Ok(true)
}

/// Returns the number of rows updated (0 or 1)
pub async fn set_discrepancy(
    id: &OrderId,
    discrepancy: &PaymentDiscrepancy,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                discrepancy_type = $1,
                discrepancy_difference = $2,
                discrepancy_detected_at = $3,
                discrepancy_resolution = $4,
                discrepancy_notes = $5,
                updated_at = $6
            WHERE id = $7
        "#,
    )
    .bind(discrepancy.discrepancy_type.as_str())
    .bind(discrepancy.difference_amount.value())
    .bind(discrepancy.detected_at)
    .bind(discrepancy.resolution.as_str())
    .bind(discrepancy.notes.as_deref())
    .bind(now)
    .bind(id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Only touches orders that already carry a discrepancy. Existing notes are kept if `notes` is `None`.
pub async fn set_discrepancy_resolution(
    id: &OrderId,
    resolution: DiscrepancyResolution,
    notes: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                discrepancy_resolution = $1,
                discrepancy_notes = COALESCE($2, discrepancy_notes),
                updated_at = $3
            WHERE id = $4 AND discrepancy_type IS NOT NULL
        "#,
    )
    .bind(resolution.as_str())
    .bind(notes)
    .bind(now)
    .bind(id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_refund_info(
    id: &OrderId,
    info: &RefundInfo,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                refund_amount = $1,
                refund_wallet = $2,
                refund_signature = $3,
                refund_initiated_at = $4,
                refund_completed_at = $5,
                refund_reason = $6,
                updated_at = $7
            WHERE id = $8
        "#,
    )
    .bind(info.amount.value())
    .bind(&info.wallet_address)
    .bind(info.transaction_signature.as_deref())
    .bind(info.initiated_at)
    .bind(info.completed_at)
    .bind(&info.reason)
    .bind(now)
    .bind(id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
