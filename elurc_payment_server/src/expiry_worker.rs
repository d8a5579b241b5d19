use elurc_payment_engine::{db_types::Order, solana::SolanaRpcClient, PaymentMonitor, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every minute, pending orders that are older than the payment window are moved to `timeout`. Orders also time out
/// when they are polled, so this only matters for checkouts that were abandoned.
pub fn start_expiry_worker(monitor: PaymentMonitor<SqliteDatabase, SolanaRpcClient>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        info!("🕰️ Pending order expiry worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running pending order expiry job");
            match monitor.expire_stale_orders().await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No orders expired"),
                Ok(expired) => {
                    info!("🕰️ {} orders expired", expired.len());
                    debug!("🕰️ Expired orders: {}", order_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running pending order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_number: {} created_at: {}", o.id, o.order_number, o.created_at))
        .collect::<Vec<String>>()
        .join(", ")
}
