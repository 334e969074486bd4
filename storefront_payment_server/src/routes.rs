//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database calls,
//! gateway calls) must therefore be expressed as futures or asynchronous functions.

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use ipay_tools::PaymentNotice;
use log::*;
use spg_common::Gel;
use serde::Deserialize;
use storefront_payment_engine::{
    db_types::OrderId,
    traits::{AuthManagement, GatewayClient, GatewayClientError, PaymentGatewayDatabase},
    AuthApi,
    AuthApiError,
    PaymentFlowApi,
    PaymentFlowError,
};

use crate::{
    auth::{hash_password, verify_password, AdminClaims, TokenIssuer},
    data_objects::{
        AdminUserRequest,
        JsonResponse,
        LoginRequest,
        LoginResponse,
        NewOrderRequest,
        OrderStatusResponse,
        PaymentsQuery,
        RefundRequest,
        RefundResponse,
        SearchOrdersParams,
        UpdateStatusRequest,
    },
    errors::{AuthError, ServerError},
    integrations::payment_update_from_notice,
};

const DEFAULT_PAYMENTS_PAGE: i64 = 50;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

route!(new_order => Post "/orders" impl PaymentGatewayDatabase, GatewayClient);
/// Accept a new storefront order and open a checkout session for it.
///
/// On success the response carries the order, the gateway's id for it, and the payment page URL the customer must
/// be redirected to. A gateway outage leaves the order stored in `pending`; the storefront still gets a 200 with
/// the saved order and an `error` field so it can show the customer that the order was taken but payment has to
/// wait. Only a gateway answer we cannot interpret is a hard 502.
pub async fn new_order<B, G>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    let order = body.into_inner().try_into_new_order().map_err(ServerError::InvalidRequestBody)?;
    let order_id = order.order_id.clone();
    debug!("🛒️ New order {order_id} for {}", order.total_price);
    match api.initiate_order(order).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(summary)),
        Err(PaymentFlowError::GatewayError(e))
            if !matches!(e, GatewayClientError::InvalidResponse(_)) =>
        {
            warn!("🛒️ Order {order_id} is saved but checkout could not be opened. {e}");
            let order = api.fetch_order(&order_id).await?;
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "order": order,
                "error": "Payment could not be initiated.",
                "details": e.to_string(),
            })))
        },
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusQuery {
    pub id: String,
}

route!(order_status => Get "/orders/status" impl PaymentGatewayDatabase, GatewayClient);
/// The customer-facing order status view, keyed by `?id=`.
pub async fn order_status<B, G>(
    query: web::Query<OrderStatusQuery>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    let order_id = OrderId(query.into_inner().id);
    let order = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(OrderStatusResponse::from(order)))
}

//----------------------------------------------   Webhook  ----------------------------------------------------

route!(ipay_webhook => Post "/webhook" impl PaymentGatewayDatabase, GatewayClient);
/// The payment notification webhook. The signature middleware has already verified the body by the time this
/// handler runs.
///
/// A delivery only gets a 200 once it has been recorded. Anything else is a 4xx/5xx so the gateway retries it:
/// an unparseable body is a 400, a notification for an order we do not know is a 404, and a storage failure is
/// a 500.
pub async fn ipay_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    trace!("💳️ Received webhook request: {}", req.uri());
    let content_type = req.headers().get("content-type").and_then(|v| v.to_str().ok());
    let notice = PaymentNotice::parse(content_type, body.as_ref()).map_err(|e| {
        warn!("💳️ Could not parse payment notification. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let update = payment_update_from_notice(notice);
    let order_id = update.order_id.clone();
    match api.process_payment_update(update).await {
        Ok(Some(order)) => info!("💳️ Order {} is now '{}'", order.order_id, order.status),
        Ok(None) => debug!("💳️ Notification for order {order_id} recorded without a status change"),
        Err(e) => {
            warn!("💳️ Could not process notification for order {order_id}. {e}");
            return Err(e.into());
        },
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({"ok": true})))
}

//----------------------------------------------   Auth  ----------------------------------------------------

route!(login => Post "/auth/login" impl AuthManagement);
/// Admin login. Verifies the password against the stored hash and issues a session token.
pub async fn login<A>(
    body: web::Json<LoginRequest>,
    api: web::Data<AuthApi<A>>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError>
where
    A: AuthManagement,
{
    let LoginRequest { username, password } = body.into_inner();
    let user = match api.fetch_admin_user(&username).await {
        Ok(user) => user,
        Err(AuthApiError::UserNotFound) => {
            // Same response as a wrong password, so usernames cannot be probed.
            warn!("🔑️ Login attempt for unknown admin '{username}'");
            return Err(AuthError::InvalidCredentials.into());
        },
        Err(e) => return Err(e.into()),
    };
    if !verify_password(&password, &user.password_hash) {
        warn!("🔑️ Failed login attempt for admin '{username}'");
        return Err(AuthError::InvalidCredentials.into());
    }
    let token = issuer.issue(&user.username)?;
    info!("🔑️ Admin '{username}' logged in");
    Ok(HttpResponse::Ok().json(LoginResponse { token }))
}

route!(check_token => Get "/check_token");
pub async fn check_token(claims: web::ReqData<AdminClaims>) -> HttpResponse {
    HttpResponse::Ok().json(JsonResponse::success(format!("Session for '{}' is valid.", claims.sub)))
}

route!(upsert_admin => Post "/admin_user" impl AuthManagement);
/// Create an admin account, or reset its password. Only reachable with a valid admin session.
pub async fn upsert_admin<A>(
    body: web::Json<AdminUserRequest>,
    api: web::Data<AuthApi<A>>,
    claims: web::ReqData<AdminClaims>,
) -> Result<HttpResponse, ServerError>
where
    A: AuthManagement,
{
    let AdminUserRequest { username, password } = body.into_inner();
    if username.trim().is_empty() || password.len() < 8 {
        return Err(ServerError::InvalidRequestBody(
            "username must not be empty and the password needs at least 8 characters".to_string(),
        ));
    }
    api.upsert_admin_user(&username, &hash_password(&password)).await?;
    info!("🔑️ Admin '{}' set credentials for '{username}'", claims.sub);
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Credentials for '{username}' saved."))))
}

//----------------------------------------------   Admin: orders  ----------------------------------------------------

route!(orders_search => Get "/orders" impl PaymentGatewayDatabase, GatewayClient);
pub async fn orders_search<B, G>(
    query: web::Query<SearchOrdersParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    let filter = query.into_inner().try_into_filter().map_err(ServerError::InvalidRequestPath)?;
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl PaymentGatewayDatabase, GatewayClient);
pub async fn order_by_id<B, G>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    let order_id = OrderId(path.into_inner());
    let order = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Put "/orders/{order_id}/status" impl PaymentGatewayDatabase, GatewayClient);
/// Admin fulfilment progress. Only `preparing`, `sent` and `completed` can be set this way; payment and refund
/// statuses are owned by the gateway flows and are rejected here.
pub async fn update_order_status<B, G>(
    path: web::Path<String>,
    body: web::Json<UpdateStatusRequest>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    let order_id = OrderId(path.into_inner());
    let new_status = body.into_inner().status;
    debug!("📦️ Admin requests order {order_id} be moved to '{new_status}'");
    let order = api.advance_order(&order_id, new_status).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_payments => Get "/orders/{order_id}/payments" impl PaymentGatewayDatabase, GatewayClient);
pub async fn order_payments<B, G>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    let order_id = OrderId(path.into_inner());
    let payments = api.payments_for_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(payments))
}

route!(payments => Get "/payments" impl PaymentGatewayDatabase, GatewayClient);
pub async fn payments<B, G>(
    query: web::Query<PaymentsQuery>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    let limit = query.limit.unwrap_or(DEFAULT_PAYMENTS_PAGE).clamp(1, 1000);
    let payments = api.fetch_payments(limit).await?;
    Ok(HttpResponse::Ok().json(payments))
}

//----------------------------------------------   Admin: refunds  ---------------------------------------------------

route!(refund => Post "/payments/refund" impl PaymentGatewayDatabase, GatewayClient, AuthManagement);
/// Refund an order, fully or partially. See [`PaymentFlowApi::refund`] for the precondition order and the manual
/// fallback behaviour.
///
/// A valid session is not enough here. Refunds move money, so the caller re-supplies the admin password and it is
/// verified against the stored hash before anything is done.
pub async fn refund<B, G, A>(
    body: web::Json<RefundRequest>,
    api: web::Data<PaymentFlowApi<B, G>>,
    auth_api: web::Data<AuthApi<A>>,
    claims: web::ReqData<AdminClaims>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
    A: AuthManagement,
{
    let RefundRequest { order_id, amount, admin_password } = body.into_inner();
    let admin = auth_api.fetch_admin_user(&claims.sub).await?;
    if !verify_password(&admin_password, &admin.password_hash) {
        warn!("↩️ Admin '{}' failed the password re-check for a refund request", claims.sub);
        return Err(AuthError::WrongPassword.into());
    }
    let order_id = OrderId(order_id);
    let amount = amount
        .map(|a| Gel::try_from(a).map_err(|e| ServerError::InvalidRequestBody(e.to_string())))
        .transpose()?;
    info!(
        "↩️ Admin '{}' requests a {} refund for order {order_id}",
        claims.sub,
        amount.map(|a| a.to_string()).unwrap_or_else(|| "full".to_string())
    );
    let result = api.refund(&order_id, amount, &claims.sub).await?;
    let message = if result.manual_mode {
        "The gateway could not process this refund. It has been queued for manual settlement and the operator has \
         been alerted."
            .to_string()
    } else {
        "Refund accepted and settled by the gateway.".to_string()
    };
    Ok(HttpResponse::Ok().json(RefundResponse {
        success: true,
        order_id: result.order.order_id.clone(),
        amount: result.amount,
        manual_mode: result.manual_mode,
        new_status: result.order.status,
        action_id: result.action_id,
        message,
    }))
}

route!(sync_orders => Post "/payments/sync" impl PaymentGatewayDatabase, GatewayClient);
/// Reconcile recent orders against the gateway and report what changed.
pub async fn sync_orders<B, G>(
    api: web::Data<PaymentFlowApi<B, G>>,
    claims: web::ReqData<AdminClaims>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    info!("🔁️ Admin '{}' started a gateway reconciliation pass", claims.sub);
    let report = api.sync_orders().await?;
    Ok(HttpResponse::Ok().json(report))
}
