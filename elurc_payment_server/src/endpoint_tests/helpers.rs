use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::{DateTime, Utc};
use elurc_payment_engine::{
    db_types::{ElurcAmount, EurCents, Order, OrderId, OrderStatusType, Refund, RefundStatus},
    test_utils::fixtures::test_pubkey,
};
use log::debug;
use serde_json::Value;

pub const ADMIN_TOKEN: &str = "open-sesame";
pub const ORDER_ID: &str = "order-1";

pub fn admin_headers() -> Vec<(&'static str, &'static str)> {
    vec![("elurc_admin_token", ADMIN_TOKEN), ("elurc_admin_id", "alice")]
}

pub fn customer_wallet() -> String {
    test_pubkey(7).to_string()
}

pub fn order(status: OrderStatusType, created_at: DateTime<Utc>) -> Order {
    Order {
        id: OrderId::new(ORDER_ID),
        order_number: "ORD-1001".to_string(),
        amount_elurc: ElurcAmount::from(10_000_000),
        amount_eur: EurCents::from(1_250),
        customer_wallet: customer_wallet(),
        customer_email: "alice@example.com".to_string(),
        status,
        transaction_signature: None,
        paid_at: None,
        fulfilled_at: None,
        payment_discrepancy: None,
        refund_info: None,
        items: vec![],
        status_history: vec![],
        created_at,
        updated_at: created_at,
    }
}

pub fn refund(status: RefundStatus) -> Refund {
    Refund {
        id: 1,
        refund_number: "REF-1718000000000-00aa".to_string(),
        order_id: OrderId::new(ORDER_ID),
        amount: ElurcAmount::from(2_000_000),
        wallet_address: customer_wallet(),
        reason: "Overpayment".to_string(),
        admin_notes: None,
        status,
        transaction_signature: None,
        error_message: None,
        initiated_by: Some("alice".to_string()),
        source_ip: None,
        created_at: Utc::now(),
        processed_at: None,
        completed_at: None,
        failed_at: None,
    }
}

pub async fn get_request<F>(headers: &[(&str, &str)], path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let mut req = TestRequest::get().uri(path);
    for &(name, value) in headers {
        req = req.insert_header((name, value));
    }
    send(req, configure).await
}

pub async fn post_request<F>(headers: &[(&str, &str)], path: &str, body: &Value, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let mut req = TestRequest::post().uri(path).set_json(body);
    for &(name, value) in headers {
        req = req.insert_header((name, value));
    }
    send(req, configure).await
}

async fn send<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).expect("Response was not JSON")
}
