//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every chain and database call here is async, and the payment status
//! and refund handlers in particular spend most of their time waiting on the Solana RPC node, so they must never be
//! made blocking.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use elurc_payment_engine::{
    db_types::{ChangedBy, OrderId},
    payments::PaymentCheckStatus,
    OrderFlowApi,
    OrderManagement,
    PaymentMonitor,
    RefundApi,
    RefundManagement,
    RefundRequest,
    SolanaRpc,
};
use log::*;

use crate::{
    config::ServerOptions,
    data_objects::{DiscrepancyResolutionParams, NewOrderParams, OrderStatusChange, RefundResponse},
    errors::ServerError,
    helpers::{get_admin_id, get_remote_ip},
};

/// What customers see when their payment could not be verified. The details are logged instead.
pub const PAYMENT_CHECK_FAILED_MESSAGE: &str =
    "We could not verify your payment yet. Please try again in a moment, or contact us if the problem persists.";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl <$($param:ident: $bound:ident $(+ $more:ident)*),+> $(requires $guard:ident)?) => {
        paste::paste! { pub struct [<$name:camel Route>]<$($param),+>(core::marker::PhantomData<fn() -> ($($param,)+)>);}
        paste::paste! {
            impl<$($param),+> [<$name:camel Route>]<$($param),+> {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self {
                    Self(core::marker::PhantomData)
                }
            }
        }
        paste::paste! {
            impl<$($param),+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$($param),+>
            where
                $($param: $bound $(+ $more)* + 'static,)+
            {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name::<$($param),+>);
                    $(let res = res.wrap($crate::middleware::[<$guard:camel AuthFactory>]::new());)?
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_status => Get "/payment/status/{order_id}" impl <B: OrderManagement, C: SolanaRpc>);
/// Route handler for the payment status endpoint
///
/// The storefront polls this endpoint while the customer pays. Each call runs the payment monitor, so this is where
/// pending orders get committed as `paid`, or time out.
///
/// The response is `{status, transactionSignature?, amount?, timestamp?, message?}` with `status` one of `pending`,
/// `confirmed`, `timeout` or `error`. Customers only ever see a generic message for errors.
pub async fn payment_status<B, C>(
    path: web::Path<OrderId>,
    monitor: web::Data<PaymentMonitor<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    C: SolanaRpc,
{
    let order_id = path.into_inner();
    trace!("💻️ GET payment_status({order_id})");
    let mut result = monitor.check_payment_status(&order_id).await;
    if result.status == PaymentCheckStatus::Error {
        info!(
            "💻️ Payment check for order {order_id} failed. {}",
            result.message.as_deref().unwrap_or("No details were given")
        );
        result.message = Some(PAYMENT_CHECK_FAILED_MESSAGE.to_string());
    }
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Refunds  ----------------------------------------------------
route!(refund => Post "/admin/refund" impl <B: OrderManagement + RefundManagement, C: SolanaRpc> requires admin);
/// Route handler for the refund endpoint
///
/// Admins use this endpoint to send (part of) an order's payment back to a wallet. The body is a
/// [`RefundRequest`]. The admin id (from the `elurc_admin_id` header) and the caller's IP address are stored with the
/// refund for the audit trail.
///
/// ## Returns
/// `{success, refundId, transactionSignature, refundAmount}` once the transfer is confirmed on-chain.
/// * 400 if the request fails validation (amount, wallet, order status).
/// * 404 if the order does not exist.
/// * 409 if the order already has a refund in progress.
/// * 500 if the transfer failed.
pub async fn refund<B, C>(
    req: HttpRequest,
    body: web::Json<RefundRequest>,
    options: web::Data<ServerOptions>,
    api: web::Data<RefundApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + RefundManagement,
    C: SolanaRpc,
{
    let admin = get_admin_id(&req);
    let ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded).map(|ip| ip.to_string());
    let request = body.into_inner().with_audit(admin, ip);
    info!(
        "💻️ Refund request of {} for order {} by {} from {}",
        request.refund_amount,
        request.order_id,
        request.initiated_by.as_deref().unwrap_or("unknown admin"),
        request.source_ip.as_deref().unwrap_or("unknown address")
    );
    let receipt = api.process_refund(request).await.map_err(|e| {
        warn!("💻️ Refund request failed. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(RefundResponse::from(receipt)))
}

route!(order_refunds => Get "/admin/order/{order_id}/refunds" impl <B: OrderManagement + RefundManagement, C: SolanaRpc> requires admin);
pub async fn order_refunds<B, C>(
    path: web::Path<OrderId>,
    api: web::Data<RefundApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + RefundManagement,
    C: SolanaRpc,
{
    let order_id = path.into_inner();
    debug!("💻️ GET order_refunds({order_id})");
    let refunds = api.refunds_for_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(refunds))
}

route!(stuck_refunds => Get "/admin/refunds/stuck" impl <B: OrderManagement + RefundManagement, C: SolanaRpc> requires admin);
/// Refunds that were sent to the chain, but never marked as completed or failed. Each one must be checked against the
/// chain by hand.
pub async fn stuck_refunds<B, C>(api: web::Data<RefundApi<B, C>>) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + RefundManagement,
    C: SolanaRpc,
{
    debug!("💻️ GET stuck_refunds");
    let refunds = api.stuck_refunds().await?;
    if !refunds.is_empty() {
        warn!("💻️ There are {} refunds with an unknown outcome", refunds.len());
    }
    Ok(HttpResponse::Ok().json(refunds))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/admin/orders" impl <B: OrderManagement> requires admin);
/// Creates a `pending` order. The body is a [`NewOrderParams`].
///
/// ## Returns
/// 201 with the new order record.
/// * 400 if the amount, order number, wallet or an item quantity is invalid.
/// * 409 if the order number is already taken.
pub async fn create_order<B: OrderManagement>(
    body: web::Json<NewOrderParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST create_order({})", params.order_number);
    let order = api.insert_order(params.into()).await.map_err(|e| {
        info!("💻️ Order could not be created. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Created().json(order))
}

route!(admin_order => Get "/admin/order/{order_id}" impl <B: OrderManagement> requires admin);
/// The full order record, including the status history, payment discrepancy and refund details.
pub async fn admin_order<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET admin_order({order_id})");
    let order = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_status => Post "/admin/order/{order_id}/status" impl <B: OrderManagement> requires admin);
/// Moves an order to a new status. The body is `{status, reason?}`.
///
/// Only transitions allowed by the order life cycle are accepted; anything else is a 400. If the order changed while
/// the request was being handled, the response is a 409 and the request can be retried.
pub async fn order_status<B: OrderManagement>(
    req: HttpRequest,
    path: web::Path<OrderId>,
    body: web::Json<OrderStatusChange>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let OrderStatusChange { status, reason } = body.into_inner();
    let reason = match (reason, get_admin_id(&req)) {
        (Some(r), Some(admin)) => Some(format!("{r} [{admin}]")),
        (None, Some(admin)) => Some(format!("Changed by {admin}")),
        (r, None) => r,
    };
    info!(
        "💻️ Status change request for {order_id} to {status}. {}",
        reason.as_deref().unwrap_or("No reason given")
    );
    let order = api.modify_status(&order_id, status, ChangedBy::Admin, reason).await.map_err(|e| {
        debug!("💻️ Could not change the status of {order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(resolve_discrepancy => Post "/admin/order/{order_id}/discrepancy" impl <B: OrderManagement> requires admin);
pub async fn resolve_discrepancy<B: OrderManagement>(
    path: web::Path<OrderId>,
    body: web::Json<DiscrepancyResolutionParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let DiscrepancyResolutionParams { resolution, notes } = body.into_inner();
    info!("💻️ Discrepancy on {order_id} resolved as {resolution}");
    let order = api.resolve_discrepancy(&order_id, resolution, notes).await?;
    Ok(HttpResponse::Ok().json(order))
}
