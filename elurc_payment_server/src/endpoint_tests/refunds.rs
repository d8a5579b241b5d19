use std::sync::Arc;

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Duration, Utc};
use elurc_payment_engine::{
    db_types::{ElurcAmount, NewRefund, OrderId, OrderStatusType, RefundStatus},
    events::EventProducers,
    payments::PaymentConfig,
    solana::{ChainError, RetryPolicy, Signer},
    test_utils::{
        fake_chain::{FakeChain, SendBehaviour},
        fixtures::{test_keypair, test_mint},
    },
    RefundApi,
    StoreError,
};
use serde_json::{json, Value};

use super::{
    helpers::{admin_headers, customer_wallet, get_request, json, order, post_request, refund, ADMIN_TOKEN, ORDER_ID},
    mocks::MockStore,
};
use crate::{
    config::ServerOptions,
    middleware::AdminToken,
    routes::{OrderRefundsRoute, RefundRoute, StuckRefundsRoute},
};

fn refund_body() -> Value {
    json!({
        "orderId": ORDER_ID,
        "refundAmount": 2_000_000,
        "walletAddress": customer_wallet(),
        "reason": "Overpayment",
        "adminNotes": "Customer sent 12 ELURC"
    })
}

fn configure(store: MockStore, chain: FakeChain, token: &str) -> impl FnOnce(&mut ServiceConfig) {
    let token = AdminToken::new(token);
    move |cfg| {
        let keypair = test_keypair(42);
        let config = PaymentConfig::new(test_mint(), keypair.pubkey());
        let api = RefundApi::new(store, chain, config, Some(Arc::new(keypair)), EventProducers::default())
            .with_retry_policy(RetryPolicy::immediate(3, 2));
        cfg.service(RefundRoute::<MockStore, FakeChain>::new())
            .service(OrderRefundsRoute::<MockStore, FakeChain>::new())
            .service(StuckRefundsRoute::<MockStore, FakeChain>::new())
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(token))
            .app_data(web::Data::new(ServerOptions { use_x_forwarded_for: true, use_forwarded: false }));
    }
}

fn paid_order_store() -> MockStore {
    let mut store = MockStore::new();
    store
        .expect_fetch_order()
        .returning(|_| Ok(Some(order(OrderStatusType::Paid, Utc::now() - Duration::hours(1)))));
    store.expect_total_completed_refunds().returning(|_| Ok(ElurcAmount::from(0)));
    store
}

#[actix_web::test]
async fn refunds_require_the_admin_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request(&[], "/admin/refund", &refund_body(), configure(MockStore::new(), FakeChain::new(), ADMIN_TOKEN))
            .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json(&body)["error"].as_str().unwrap().contains("No admin token"));

    let headers = [("elurc_admin_token", "open-sesame!")];
    let (status, _) =
        post_request(&headers, "/admin/refund", &refund_body(), configure(MockStore::new(), FakeChain::new(), ADMIN_TOKEN))
            .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn unconfigured_admin_token_refuses_everyone() {
    let _ = env_logger::try_init().ok();
    let headers = [("elurc_admin_token", "")];
    let (status, _) =
        post_request(&headers, "/admin/refund", &refund_body(), configure(MockStore::new(), FakeChain::new(), "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = get_request(&admin_headers(), "/admin/refunds/stuck", configure(MockStore::new(), FakeChain::new(), ""))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn successful_refund() {
    let _ = env_logger::try_init().ok();
    let mut store = paid_order_store();
    store
        .expect_create_refund()
        .withf(|r: &NewRefund| {
            r.initiated_by.as_deref() == Some("alice") &&
                r.source_ip.as_deref() == Some("203.0.113.9") &&
                r.amount == ElurcAmount::from(2_000_000) &&
                r.admin_notes.as_deref() == Some("Customer sent 12 ELURC")
        })
        .times(1)
        .returning(|r| {
            let mut refund = refund(RefundStatus::Pending);
            refund.refund_number = r.refund_number;
            Ok(refund)
        });
    store
        .expect_record_refund_info()
        .times(2)
        .returning(|_, _| Ok(order(OrderStatusType::Paid, Utc::now() - Duration::hours(1))));
    store.expect_mark_refund_processing().times(1).returning(|_| Ok(refund(RefundStatus::Processing)));
    store.expect_mark_refund_completed().times(1).returning(|_, sig| {
        let mut refund = refund(RefundStatus::Completed);
        refund.transaction_signature = Some(sig.to_string());
        refund.completed_at = Some(Utc::now());
        Ok(refund)
    });
    store.expect_mark_refund_failed().never();
    let chain = FakeChain::new();
    let headers = [admin_headers(), vec![("X-Forwarded-For", "203.0.113.9, 10.0.0.1")]].concat();
    let (status, body) = post_request(&headers, "/admin/refund", &refund_body(), configure(store, chain.clone(), ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["refundId"], "REF-1718000000000-00aa");
    assert_eq!(body["refundAmount"], 2_000_000);
    let sent = chain.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(body["transactionSignature"], sent[0].signatures[0].to_string());
}

#[actix_web::test]
async fn pending_orders_cannot_be_refunded() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order(OrderStatusType::Pending, Utc::now()))));
    store.expect_create_refund().never();
    let chain = FakeChain::new();
    let (status, body) =
        post_request(&admin_headers(), "/admin/refund", &refund_body(), configure(store, chain.clone(), ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("pending"));
    assert_eq!(chain.calls().total(), 0);
}

#[actix_web::test]
async fn refund_amount_is_validated() {
    let _ = env_logger::try_init().ok();
    let mut store = paid_order_store();
    store.expect_create_refund().never();
    let mut body = refund_body();
    body["refundAmount"] = json!(10_000_001);
    let (status, body) = post_request(&admin_headers(), "/admin/refund", &body, configure(store, FakeChain::new(), ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("exceeds order amount"));
}

#[actix_web::test]
async fn second_refund_in_flight_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let mut store = paid_order_store();
    store.expect_create_refund().returning(|_| Err(StoreError::RefundInProgress(OrderId::new(ORDER_ID))));
    let chain = FakeChain::new();
    let (status, _) =
        post_request(&admin_headers(), "/admin/refund", &refund_body(), configure(store, chain.clone(), ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(chain.calls().send_transaction, 0);
}

#[actix_web::test]
async fn rejected_transfer_fails_the_refund() {
    let _ = env_logger::try_init().ok();
    let mut store = paid_order_store();
    store.expect_create_refund().returning(|r| {
        let mut refund = refund(RefundStatus::Pending);
        refund.refund_number = r.refund_number;
        Ok(refund)
    });
    store
        .expect_record_refund_info()
        .times(1)
        .returning(|_, _| Ok(order(OrderStatusType::Paid, Utc::now() - Duration::hours(1))));
    store.expect_mark_refund_processing().returning(|_| Ok(refund(RefundStatus::Processing)));
    store.expect_mark_refund_completed().never();
    store.expect_mark_refund_failed().times(1).returning(|_, err| {
        let mut refund = refund(RefundStatus::Failed);
        refund.error_message = Some(err.to_string());
        Ok(refund)
    });
    let chain = FakeChain::new();
    chain.set_send_behaviour(SendBehaviour::Reject(ChainError::Rpc { code: -32002, message: "insufficient funds".into() }));
    let (status, body) =
        post_request(&admin_headers(), "/admin/refund", &refund_body(), configure(store, chain, ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json(&body)["error"].as_str().unwrap().contains("insufficient funds"));
}

#[actix_web::test]
async fn unconfirmed_transfer_is_left_processing() {
    let _ = env_logger::try_init().ok();
    let mut store = paid_order_store();
    store.expect_create_refund().returning(|r| {
        let mut refund = refund(RefundStatus::Pending);
        refund.refund_number = r.refund_number;
        Ok(refund)
    });
    store
        .expect_record_refund_info()
        .times(1)
        .returning(|_, _| Ok(order(OrderStatusType::Paid, Utc::now() - Duration::hours(1))));
    store.expect_mark_refund_processing().returning(|_| Ok(refund(RefundStatus::Processing)));
    store.expect_mark_refund_completed().never();
    store.expect_mark_refund_failed().never();
    let chain = FakeChain::new();
    chain.set_send_behaviour(SendBehaviour::Drop);
    let (status, body) =
        post_request(&admin_headers(), "/admin/refund", &refund_body(), configure(store, chain.clone(), ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let sent = chain.sent_transactions();
    let error = json(&body)["error"].as_str().unwrap().to_string();
    assert!(error.contains(&sent[0].signatures[0].to_string()), "{error}");
    assert!(error.contains("reconciled by hand"));
}

#[actix_web::test]
async fn refund_history() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|id| match id.as_str() {
        ORDER_ID => Ok(Some(order(OrderStatusType::Paid, Utc::now() - Duration::hours(1)))),
        _ => Ok(None),
    });
    store
        .expect_fetch_refunds_for_order()
        .returning(|_| Ok(vec![refund(RefundStatus::Failed), refund(RefundStatus::Completed)]));
    let (status, body) =
        get_request(&admin_headers(), "/admin/order/order-1/refunds", configure(store, FakeChain::new(), ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let refunds = json(&body);
    assert_eq!(refunds.as_array().unwrap().len(), 2);
    assert_eq!(refunds[0]["status"], "failed");
    assert_eq!(refunds[1]["status"], "completed");
}

#[actix_web::test]
async fn refunds_for_unknown_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(None));
    store.expect_fetch_refunds_for_order().never();
    let (status, _) =
        get_request(&admin_headers(), "/admin/order/nope/refunds", configure(store, FakeChain::new(), ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn stuck_refunds_are_listed() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_stuck_refunds().returning(|| Ok(vec![refund(RefundStatus::Processing)]));
    let (status, body) =
        get_request(&admin_headers(), "/admin/refunds/stuck", configure(store, FakeChain::new(), ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let refunds = json(&body);
    assert_eq!(refunds[0]["status"], "processing");
    assert_eq!(refunds[0]["refund_number"], "REF-1718000000000-00aa");
}
