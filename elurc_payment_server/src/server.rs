use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use elurc_payment_engine::{
    events::EventProducers,
    solana::SolanaRpcClient,
    OrderFlowApi,
    PaymentMonitor,
    RefundApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::email::create_email_event_handlers,
    middleware::AdminToken,
    routes::{
        health,
        AdminOrderRoute,
        CreateOrderRoute,
        OrderRefundsRoute,
        OrderStatusRoute,
        PaymentStatusRoute,
        RefundRoute,
        ResolveDiscrepancyRoute,
        StuckRefundsRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let rpc = SolanaRpcClient::new(&config.rpc_url, config.rpc_timeout);
    info!("🚀️ Using Solana RPC node at {}", rpc.url());
    info!("🚀️ Payments are expected in {}", config.payments.shop_token_account());
    let handlers = create_email_event_handlers(config.email_webhook_url.clone())?;
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.expiry_sweep {
        let monitor = PaymentMonitor::new(db.clone(), rpc.clone(), config.payments.clone(), producers.clone());
        let _handle = start_expiry_worker(monitor);
    } else {
        info!("🚀️ The expiry sweep is disabled. Pending orders will only time out when they are polled.");
    }
    let srv = create_server_instance(config, db, rpc, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    rpc: SolanaRpcClient,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let admin_token = AdminToken(config.admin_token.clone());
    let payments = config.payments.clone();
    let shop_keypair = config.shop_keypair.clone();
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone());
        let monitor = PaymentMonitor::new(db.clone(), rpc.clone(), payments.clone(), producers.clone());
        let refund_api =
            RefundApi::new(db.clone(), rpc.clone(), payments.clone(), shop_keypair.clone(), producers.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("eps::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(monitor))
            .app_data(web::Data::new(refund_api))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(admin_token.clone()));
        let api_scope = web::scope("/api")
            .service(PaymentStatusRoute::<SqliteDatabase, SolanaRpcClient>::new())
            .service(RefundRoute::<SqliteDatabase, SolanaRpcClient>::new())
            .service(StuckRefundsRoute::<SqliteDatabase, SolanaRpcClient>::new())
            .service(OrderRefundsRoute::<SqliteDatabase, SolanaRpcClient>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderStatusRoute::<SqliteDatabase>::new())
            .service(ResolveDiscrepancyRoute::<SqliteDatabase>::new())
            .service(AdminOrderRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
