use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Duration, TimeZone, Utc};
use elurc_payment_engine::{
    db_types::{OrderId, OrderStatusType, OrderStatusUpdate},
    events::EventProducers,
    test_utils::{
        fake_chain::FakeChain,
        fixtures::{test_config, TransferFixture},
    },
    PaymentMonitor,
};
use mockall::predicate::eq;

use super::{
    helpers::{customer_wallet, get_request, json, order, ORDER_ID},
    mocks::MockStore,
};
use crate::routes::{PaymentStatusRoute, PAYMENT_CHECK_FAILED_MESSAGE};

fn configure(store: MockStore, chain: FakeChain) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let monitor = PaymentMonitor::new(store, chain, test_config(), EventProducers::default());
        cfg.service(PaymentStatusRoute::<MockStore, FakeChain>::new()).app_data(web::Data::new(monitor));
    }
}

#[actix_web::test]
async fn paid_order_is_confirmed_without_chain_calls() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().with(eq(OrderId::new(ORDER_ID))).returning(|_| {
        let mut o = order(OrderStatusType::Paid, Utc::now() - Duration::minutes(3));
        o.transaction_signature = Some("SigPaid".to_string());
        o.paid_at = Some(Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap());
        Ok(Some(o))
    });
    let chain = FakeChain::new();
    let (status, body) = get_request(&[], "/payment/status/order-1", configure(store, chain.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["transactionSignature"], "SigPaid");
    assert_eq!(body["amount"], 10_000_000);
    assert_eq!(body["timestamp"], 1_718_010_000_000i64);
    assert!(body.get("message").is_none());
    assert_eq!(chain.calls().total(), 0);
}

#[actix_web::test]
async fn errors_are_not_shown_to_customers() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(None));
    let (status, body) = get_request(&[], "/payment/status/nope", configure(store, FakeChain::new())).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], PAYMENT_CHECK_FAILED_MESSAGE);
}

#[actix_web::test]
async fn stale_order_times_out() {
    let _ = env_logger::try_init().ok();
    let created = Utc::now() - Duration::minutes(11);
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(move |_| Ok(Some(order(OrderStatusType::Pending, created))));
    store
        .expect_update_order_status()
        .withf(|_, expected, update: &OrderStatusUpdate| {
            *expected == OrderStatusType::Pending && update.new_status == OrderStatusType::Timeout
        })
        .times(1)
        .returning(move |_, _, _| Ok(order(OrderStatusType::Timeout, created)));
    let chain = FakeChain::new();
    let (status, body) = get_request(&[], "/payment/status/order-1", configure(store, chain.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "timeout");
    assert_eq!(chain.calls().total(), 0);
}

#[actix_web::test]
async fn matching_transfer_commits_the_order() {
    let _ = env_logger::try_init().ok();
    let created = Utc.timestamp_opt((Utc::now() - Duration::minutes(2)).timestamp(), 0).unwrap();
    let chain = FakeChain::new();
    chain.add_transfer(&TransferFixture::new(
        "SigExact",
        &customer_wallet(),
        10_000_000,
        created + Duration::seconds(30),
    ));
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(move |_| Ok(Some(order(OrderStatusType::Pending, created))));
    store
        .expect_update_order_status()
        .withf(|_, expected, update: &OrderStatusUpdate| {
            *expected == OrderStatusType::Pending &&
                update.new_status == OrderStatusType::Paid &&
                update.transaction_signature.as_deref() == Some("SigExact")
        })
        .times(1)
        .returning(move |_, _, update| {
            let mut o = order(OrderStatusType::Paid, created);
            o.transaction_signature = update.transaction_signature;
            o.paid_at = update.paid_at;
            Ok(o)
        });
    let (status, body) = get_request(&[], "/payment/status/order-1", configure(store, chain)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["transactionSignature"], "SigExact");
    assert_eq!(body["amount"], 10_000_000);
}

#[actix_web::test]
async fn no_transfer_yet_is_pending() {
    let _ = env_logger::try_init().ok();
    let created = Utc::now() - Duration::minutes(1);
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(move |_| Ok(Some(order(OrderStatusType::Pending, created))));
    store.expect_update_order_status().never();
    let (status, body) = get_request(&[], "/payment/status/order-1", configure(store, FakeChain::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"pending"}"#);
}
