use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Duration, Utc};
use elurc_payment_engine::{
    db_types::{
        ChangedBy,
        DiscrepancyResolution,
        DiscrepancyType,
        ElurcAmount,
        NewOrder,
        OrderStatusType,
        OrderStatusUpdate,
        PaymentDiscrepancy,
    },
    OrderFlowApi,
    StoreError,
};
use serde_json::json;

use super::{
    helpers::{admin_headers, customer_wallet, get_request, json, order, post_request, ADMIN_TOKEN},
    mocks::MockStore,
};
use crate::{
    middleware::AdminToken,
    routes::{AdminOrderRoute, CreateOrderRoute, OrderStatusRoute, ResolveDiscrepancyRoute},
};

fn configure(store: MockStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(AdminOrderRoute::<MockStore>::new())
            .service(CreateOrderRoute::<MockStore>::new())
            .service(OrderStatusRoute::<MockStore>::new())
            .service(ResolveDiscrepancyRoute::<MockStore>::new())
            .app_data(web::Data::new(OrderFlowApi::new(store)))
            .app_data(web::Data::new(AdminToken::new(ADMIN_TOKEN)));
    }
}

fn an_hour_ago() -> chrono::DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

#[actix_web::test]
async fn fetch_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order(OrderStatusType::Processing, an_hour_ago()))));
    let (status, body) = get_request(&admin_headers(), "/admin/order/order-1", configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["order_number"], "ORD-1001");
    assert_eq!(body["status"], "processing");
}

#[actix_web::test]
async fn fetch_unknown_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(None));
    let (status, body) = get_request(&admin_headers(), "/admin/order/nope", configure(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].as_str().unwrap().contains("nope"));
}

#[actix_web::test]
async fn admin_moves_paid_order_to_processing() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order(OrderStatusType::Paid, an_hour_ago()))));
    store
        .expect_update_order_status()
        .withf(|_, expected, update: &OrderStatusUpdate| {
            *expected == OrderStatusType::Paid &&
                update.new_status == OrderStatusType::Processing &&
                update.changed_by == ChangedBy::Admin &&
                update.reason.as_deref() == Some("Packing [alice]")
        })
        .times(1)
        .returning(|_, _, _| Ok(order(OrderStatusType::Processing, an_hour_ago())));
    let body = json!({"status": "processing", "reason": "Packing"});
    let (status, body) = post_request(&admin_headers(), "/admin/order/order-1/status", &body, configure(store)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["status"], "processing");
}

#[actix_web::test]
async fn reason_defaults_to_the_admin_id() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order(OrderStatusType::Processing, an_hour_ago()))));
    store
        .expect_update_order_status()
        .withf(|_, _, update: &OrderStatusUpdate| update.reason.as_deref() == Some("Changed by alice"))
        .times(1)
        .returning(|_, _, _| Ok(order(OrderStatusType::Fulfilled, an_hour_ago())));
    let body = json!({"status": "fulfilled"});
    let (status, _) = post_request(&admin_headers(), "/admin/order/order-1/status", &body, configure(store)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn forbidden_transitions_are_rejected() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order(OrderStatusType::Fulfilled, an_hour_ago()))));
    store.expect_update_order_status().never();
    let body = json!({"status": "cancelled", "reason": "Changed their mind"});
    let (status, body) = post_request(&admin_headers(), "/admin/order/order-1/status", &body, configure(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].is_string());
}

#[actix_web::test]
async fn unknown_status_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let store = MockStore::new();
    let body = json!({"status": "shipped"});
    let (status, _) = post_request(&admin_headers(), "/admin/order/order-1/status", &body, configure(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn status_changes_need_admin_access() {
    let _ = env_logger::try_init().ok();
    let store = MockStore::new();
    let body = json!({"status": "processing"});
    let (status, _) = post_request(&[], "/admin/order/order-1/status", &body, configure(store)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn resolve_discrepancy() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| {
        let mut o = order(OrderStatusType::Paid, an_hour_ago());
        o.payment_discrepancy =
            Some(PaymentDiscrepancy::detected(ElurcAmount::from(2_000_000), DiscrepancyType::Overpayment));
        Ok(Some(o))
    });
    store
        .expect_update_discrepancy_resolution()
        .withf(|_, resolution, notes| {
            *resolution == DiscrepancyResolution::ManuallyApproved && notes.as_deref() == Some("Customer keeps credit")
        })
        .times(1)
        .returning(|_, resolution, notes| {
            let mut o = order(OrderStatusType::Paid, an_hour_ago());
            let mut d = PaymentDiscrepancy::detected(ElurcAmount::from(2_000_000), DiscrepancyType::Overpayment);
            d.resolution = resolution;
            d.notes = notes;
            o.payment_discrepancy = Some(d);
            Ok(o)
        });
    let body = json!({"resolution": "manually_approved", "notes": "Customer keeps credit"});
    let (status, body) = post_request(&admin_headers(), "/admin/order/order-1/discrepancy", &body, configure(store)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["payment_discrepancy"]["resolution"], "manually_approved");
}

#[actix_web::test]
async fn nothing_to_resolve() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order(OrderStatusType::Paid, an_hour_ago()))));
    store.expect_update_discrepancy_resolution().never();
    let body = json!({"resolution": "manually_approved"});
    let (status, body) = post_request(&admin_headers(), "/admin/order/order-1/discrepancy", &body, configure(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("no payment discrepancy"));
}

fn new_order_body() -> serde_json::Value {
    json!({
        "order_number": "ORD-1001",
        "amount_elurc": 10_000_000,
        "amount_eur": 1_250,
        "customer_wallet": customer_wallet(),
        "customer_email": "alice@example.com",
        "items": [{"product_id": "sku-1", "quantity": 2, "price_snapshot": {"elurc": 5_000_000, "eur": 625}}]
    })
}

#[actix_web::test]
async fn create_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    let before = Utc::now();
    store
        .expect_insert_order()
        .withf(move |o: &NewOrder| {
            o.order_number == "ORD-1001" &&
                o.amount_elurc == ElurcAmount::from(10_000_000) &&
                o.customer_wallet == customer_wallet() &&
                o.items.len() == 1 &&
                o.items[0].price_snapshot.elurc == ElurcAmount::from(5_000_000) &&
                o.created_at >= before
        })
        .times(1)
        .returning(|o| Ok(order(OrderStatusType::Pending, o.created_at)));
    let (status, body) = post_request(&admin_headers(), "/admin/orders", &new_order_body(), configure(store)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let body = json(&body);
    assert_eq!(body["order_number"], "ORD-1001");
    assert_eq!(body["status"], "pending");
}

#[actix_web::test]
async fn duplicate_order_number_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_insert_order().times(1).returning(|o| Err(StoreError::DuplicateOrder(o.order_number)));
    let (status, body) = post_request(&admin_headers(), "/admin/orders", &new_order_body(), configure(store)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json(&body)["error"].as_str().unwrap().contains("ORD-1001"));
}

#[actix_web::test]
async fn invalid_orders_are_not_stored() {
    let _ = env_logger::try_init().ok();
    let mut bad_wallet = new_order_body();
    bad_wallet["customer_wallet"] = json!("not-a-wallet");
    let mut no_amount = new_order_body();
    no_amount["amount_elurc"] = json!(0);
    let mut missing_field = new_order_body();
    missing_field.as_object_mut().unwrap().remove("customer_wallet");
    for body in [bad_wallet, no_amount, missing_field] {
        let mut store = MockStore::new();
        store.expect_insert_order().never();
        let (status, response) = post_request(&admin_headers(), "/admin/orders", &body, configure(store)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} gave {response}");
    }
}

#[actix_web::test]
async fn creating_orders_needs_admin_access() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_insert_order().never();
    let (status, _) = post_request(&[], "/admin/orders", &new_order_body(), configure(store)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
