use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use serde_json::json;
use spg_common::Secret;
use storefront_payment_engine::{
    db_types::{OrderId, OrderStatusType},
    test_utils::{MemoryDatabase, ScriptedGateway},
};

use crate::{
    config::WebhookConfig,
    endpoint_tests::helpers::{body_string, flow_api, order_request_json},
    helpers::calculate_hmac,
    middleware::SignatureMiddlewareFactory,
    routes::{IpayWebhookRoute, NewOrderRoute},
};

const WEBHOOK_SECRET: &str = "webhook-test-secret";

fn webhook_config() -> WebhookConfig {
    WebhookConfig { hmac_secret: Secret::new(WEBHOOK_SECRET.to_string()), ..WebhookConfig::default() }
}

fn webhook_app(
    db: &MemoryDatabase,
    gateway: &ScriptedGateway,
    config: WebhookConfig,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(flow_api(db, gateway)))
        .service(NewOrderRoute::<MemoryDatabase, ScriptedGateway>::new())
        .service(
            web::scope("/payments")
                .wrap(SignatureMiddlewareFactory::new(&config))
                .service(IpayWebhookRoute::<MemoryDatabase, ScriptedGateway>::new()),
        )
}

fn signed_notification(payload: &serde_json::Value, secret: &str) -> TestRequest {
    let body = serde_json::to_vec(payload).unwrap();
    let signature = calculate_hmac(secret, &body);
    TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(("content-type", "application/json"))
        .insert_header(("x-ipay-signature", signature))
        .set_payload(body)
}

async fn seed_order(service: &impl actix_web::dev::Service<
    actix_http::Request,
    Response = actix_web::dev::ServiceResponse,
    Error = actix_web::Error,
>) {
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    let resp = test::call_service(service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn a_signed_success_notification_marks_the_order_paid() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(webhook_app(&db, &gateway, webhook_config())).await;
    seed_order(&service).await;

    let payload = json!({
        "external_order_id": "ord-1",
        "id": "gw-ord-1",
        "order_status": { "key": "success", "value": "წარმატებული" },
        "payment_method": "card",
        "amount": "37.00"
    });
    let resp = test::call_service(&service, signed_notification(&payload, WEBHOOK_SECRET).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    assert!(body.contains("\"ok\":true"));

    let api = flow_api(&db, &gateway);
    let order = api.fetch_order(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(db.payment_count(), 1);
}

#[actix_web::test]
async fn a_bad_signature_is_rejected_and_nothing_is_recorded() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(webhook_app(&db, &gateway, webhook_config())).await;
    seed_order(&service).await;

    let payload = json!({"external_order_id": "ord-1", "order_status": "success"});
    let status = test::try_call_service(&service, signed_notification(&payload, "wrong-secret").to_request())
        .await
        .map_or_else(|e| e.error_response().status(), |resp| resp.status());
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(("content-type", "application/json"))
        .set_json(&payload)
        .to_request();
    let status = test::try_call_service(&service, req)
        .await
        .map_or_else(|e| e.error_response().status(), |resp| resp.status());
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let api = flow_api(&db, &gateway);
    let order = api.fetch_order(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(db.payment_count(), 0);
}

#[actix_web::test]
async fn an_empty_secret_fails_closed() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let config = WebhookConfig { hmac_secret: Secret::default(), ..WebhookConfig::default() };
    let service = test::init_service(webhook_app(&db, &gateway, config)).await;
    seed_order(&service).await;

    let payload = json!({"external_order_id": "ord-1", "order_status": "success"});
    let status = test::try_call_service(&service, signed_notification(&payload, "").to_request())
        .await
        .map_or_else(|e| e.error_response().status(), |resp| resp.status());
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn signature_checks_can_be_disabled_for_development() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let config = WebhookConfig { hmac_checks: false, ..webhook_config() };
    let service = test::init_service(webhook_app(&db, &gateway, config)).await;
    seed_order(&service).await;

    let payload = json!({"external_order_id": "ord-1", "order_status": "success"});
    let req = TestRequest::post().uri("/payments/webhook").set_json(&payload).to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn unknown_statuses_are_recorded_without_moving_the_order() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(webhook_app(&db, &gateway, webhook_config())).await;
    seed_order(&service).await;

    let payload = json!({"external_order_id": "ord-1", "order_status": "in_progress"});
    let resp = test::call_service(&service, signed_notification(&payload, WEBHOOK_SECRET).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let api = flow_api(&db, &gateway);
    let order = api.fetch_order(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(db.payment_count(), 1);
}

#[actix_web::test]
async fn notifications_for_unknown_orders_are_a_404_so_the_gateway_retries() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(webhook_app(&db, &gateway, webhook_config())).await;

    let payload = json!({"external_order_id": "ord-missing", "order_status": "success"});
    let resp = test::call_service(&service, signed_notification(&payload, WEBHOOK_SECRET).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(db.payment_count(), 0);
}

#[actix_web::test]
async fn unparseable_bodies_are_a_400() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(webhook_app(&db, &gateway, webhook_config())).await;

    let body = b"this is not a notification".to_vec();
    let signature = calculate_hmac(WEBHOOK_SECRET, &body);
    let req = TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(("x-ipay-signature", signature))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(db.payment_count(), 0);
}
