#![allow(dead_code)]
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use elurc_payment_engine::{
    db_types::{ElurcAmount, EurCents, NewOrder, Order, OrderItem},
    payments::Clock,
    test_utils::{
        fixtures::test_pubkey,
        prepare_env::{prepare_test_env, random_db_path},
    },
    OrderManagement,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await
}

pub async fn tear_down(db: SqliteDatabase) {
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(db.url()).await {
        error!("🚀️ Failed to drop test database: {e}");
    }
}

/// A whole number of seconds in the recent past, so that block times (in seconds) line up exactly
pub fn recent_time(minutes_ago: i64) -> DateTime<Utc> {
    let t = Utc::now() - Duration::minutes(minutes_ago);
    Utc.timestamp_opt(t.timestamp(), 0).unwrap()
}

pub fn fixed_clock(now: DateTime<Utc>) -> Clock {
    Arc::new(move || now)
}

pub fn customer_wallet() -> String {
    test_pubkey(7).to_string()
}

pub fn new_order(number: &str, amount: i64, created_at: DateTime<Utc>) -> NewOrder {
    NewOrder::new(number.to_string(), ElurcAmount::from(amount), customer_wallet())
        .with_email("alice@example.com")
        .with_eur(EurCents::from(1_250))
        .with_item(OrderItem::new("sku-1", 2, ElurcAmount::from(amount / 2), EurCents::from(625)))
        .created_at(created_at)
}

pub async fn insert_order(db: &SqliteDatabase, number: &str, amount: i64, created_at: DateTime<Utc>) -> Order {
    db.insert_order(new_order(number, amount, created_at)).await.expect("Error inserting order")
}
