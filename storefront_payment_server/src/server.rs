use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use ipay_tools::IpayConfig;
use log::*;
use storefront_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    AuthApi,
    PaymentFlowApi,
    SqliteDatabase,
};

use crate::{
    auth::{hash_password, TokenIssuer},
    config::ServerConfig,
    errors::ServerError,
    integrations::{IpayGateway, WhatsAppNotifier},
    middleware::{AclMiddlewareFactory, SignatureMiddlewareFactory},
    routes::{
        health,
        CheckTokenRoute,
        IpayWebhookRoute,
        LoginRoute,
        NewOrderRoute,
        OrderByIdRoute,
        OrderPaymentsRoute,
        OrderStatusRoute,
        OrdersSearchRoute,
        PaymentsRoute,
        RefundRoute,
        SyncOrdersRoute,
        UpdateOrderStatusRoute,
        UpsertAdminRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 100;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    seed_admin_user(&config, &db).await?;
    let gateway = IpayGateway::new(IpayConfig::new_from_env_or_default())?;
    let mut hooks = EventHooks::default();
    if config.whatsapp.enabled {
        WhatsAppNotifier::new(config.whatsapp.clone()).attach(&mut hooks);
    }
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Create the admin account named in the configuration, replacing its password hash if it already exists. This is
/// how the first admin comes into being; further accounts are managed through the API.
async fn seed_admin_user(config: &ServerConfig, db: &SqliteDatabase) -> Result<(), ServerError> {
    let Some(seed) = &config.seed_admin else {
        return Ok(());
    };
    let auth_api = AuthApi::new(db.clone());
    auth_api.upsert_admin_user(&seed.username, &hash_password(seed.password.reveal())).await?;
    info!("🔑️ Admin account '{}' seeded from the environment", seed.username);
    Ok(())
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: IpayGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let flow_api = PaymentFlowApi::new(db.clone(), gateway.clone(), producers.clone());
        let auth_api = AuthApi::new(db.clone());
        let token_issuer = TokenIssuer::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(token_issuer));
        // Routes that require an admin session
        let admin_scope = web::scope("/api")
            .wrap(AclMiddlewareFactory::new(&config.auth))
            .service(OrdersSearchRoute::<SqliteDatabase, IpayGateway>::new())
            .service(OrderByIdRoute::<SqliteDatabase, IpayGateway>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase, IpayGateway>::new())
            .service(OrderPaymentsRoute::<SqliteDatabase, IpayGateway>::new())
            .service(PaymentsRoute::<SqliteDatabase, IpayGateway>::new())
            .service(RefundRoute::<SqliteDatabase, IpayGateway, SqliteDatabase>::new())
            .service(SyncOrdersRoute::<SqliteDatabase, IpayGateway>::new())
            .service(UpsertAdminRoute::<SqliteDatabase>::new())
            .service(CheckTokenRoute::new());
        // The gateway webhook, behind the signature check
        let webhook_scope = web::scope("/payments")
            .wrap(SignatureMiddlewareFactory::new(&config.webhook))
            .service(IpayWebhookRoute::<SqliteDatabase, IpayGateway>::new());
        app.service(health)
            .service(NewOrderRoute::<SqliteDatabase, IpayGateway>::new())
            .service(OrderStatusRoute::<SqliteDatabase, IpayGateway>::new())
            .service(LoginRoute::<SqliteDatabase>::new())
            .service(admin_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
