use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use serde_json::{json, Value};
use spg_common::Gel;
use storefront_payment_engine::{
    db_types::{OrderId, OrderStatusType},
    test_utils::{MemoryDatabase, ScriptedGateway},
    traits::{GatewayClientError, RemoteStatus},
    AuthApi,
};

use crate::{
    auth::{hash_password, ADMIN_TOKEN_HEADER},
    data_objects::RefundResponse,
    endpoint_tests::helpers::{admin_token, body_string, flow_api, order_request_json, paid_update, test_auth_config},
    middleware::AclMiddlewareFactory,
    routes::{
        NewOrderRoute,
        OrderStatusRoute,
        OrdersSearchRoute,
        RefundRoute,
        SyncOrdersRoute,
        UpdateOrderStatusRoute,
    },
};

const ADMIN_PASSWORD: &str = "kharcho123";

fn test_app(
    db: &MemoryDatabase,
    gateway: &ScriptedGateway,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let config = test_auth_config();
    let admin_scope = web::scope("/api")
        .wrap(AclMiddlewareFactory::new(&config))
        .service(OrdersSearchRoute::<MemoryDatabase, ScriptedGateway>::new())
        .service(UpdateOrderStatusRoute::<MemoryDatabase, ScriptedGateway>::new())
        .service(RefundRoute::<MemoryDatabase, ScriptedGateway, MemoryDatabase>::new())
        .service(SyncOrdersRoute::<MemoryDatabase, ScriptedGateway>::new());
    App::new()
        .app_data(web::Data::new(flow_api(db, gateway)))
        .app_data(web::Data::new(AuthApi::new(db.clone())))
        .service(NewOrderRoute::<MemoryDatabase, ScriptedGateway>::new())
        .service(OrderStatusRoute::<MemoryDatabase, ScriptedGateway>::new())
        .service(admin_scope)
}

async fn seed_admin(db: &MemoryDatabase) {
    AuthApi::new(db.clone()).upsert_admin_user("manager", &hash_password(ADMIN_PASSWORD)).await.unwrap();
}

#[actix_web::test]
async fn creating_an_order_returns_the_payment_page() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let summary: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(summary["gateway_order_id"], "gw-ord-1");
    assert_eq!(summary["payment_url"], "https://gateway.test/pay/gw-ord-1");
    assert_eq!(summary["order"]["status"], "pending");
    assert_eq!(db.order_count(), 1);
    assert_eq!(gateway.checkout_calls(), 1);
}

#[actix_web::test]
async fn invalid_phone_numbers_are_rejected_before_the_gateway_is_called() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(test_app(&db, &gateway)).await;
    let mut body = order_request_json("ord-1");
    body["customer"]["phone"] = json!("555123456");
    let req = TestRequest::post().uri("/orders").set_json(body).to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(db.order_count(), 0);
    assert_eq!(gateway.checkout_calls(), 0);
}

#[actix_web::test]
async fn an_order_needs_an_address_or_a_map_point() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(test_app(&db, &gateway)).await;
    let mut body = order_request_json("ord-1");
    body["address"] = json!({});
    let req = TestRequest::post().uri("/orders").set_json(body).to_request();
    assert_eq!(test::call_service(&service, req).await.status(), StatusCode::BAD_REQUEST);

    let mut body = order_request_json("ord-1");
    body["address"] = json!({ "location": { "lat": 41.7151, "lng": 44.8271 } });
    let req = TestRequest::post().uri("/orders").set_json(body).to_request();
    assert_eq!(test::call_service(&service, req).await.status(), StatusCode::OK);
    assert_eq!(db.order_count(), 1);
}

#[actix_web::test]
async fn duplicate_order_ids_conflict() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    assert_eq!(test::call_service(&service, req).await.status(), StatusCode::OK);
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    assert_eq!(test::call_service(&service, req).await.status(), StatusCode::CONFLICT);
    assert_eq!(db.order_count(), 1);
}

#[actix_web::test]
async fn a_gateway_outage_keeps_the_order_and_reports_the_problem() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    gateway.fail_checkouts_with(GatewayClientError::Unavailable("connection refused".to_string()));
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(body["error"], "Payment could not be initiated.");
    assert_eq!(body["order"]["status"], "pending");
    assert!(body["order"]["payment_url"].is_null());
    assert_eq!(db.order_count(), 1);
}

#[actix_web::test]
async fn an_uninterpretable_gateway_answer_is_a_502() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    gateway.fail_checkouts_with(GatewayClientError::InvalidResponse("no order id".to_string()));
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(db.order_count(), 1);
}

#[actix_web::test]
async fn the_customer_status_view_hides_internals() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    test::call_service(&service, req).await;

    let req = TestRequest::get().uri("/orders/status?id=ord-1").to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    let view: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(view["status"], "pending");
    assert_eq!(view["payment_url"], "https://gateway.test/pay/gw-ord-1");
    assert!(!body.contains("+995555123456"));
    assert!(!body.contains("notification_sent"));

    let req = TestRequest::get().uri("/orders/status?id=no-such-order").to_request();
    assert_eq!(test::call_service(&service, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn admin_routes_require_a_session() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::get().uri("/api/orders").to_request();
    let status = test::try_call_service(&service, req)
        .await
        .map_or_else(|e| e.error_response().status(), |resp| resp.status());
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::get()
        .uri("/api/orders?status=pending")
        .insert_header((ADMIN_TOKEN_HEADER, admin_token()))
        .to_request();
    assert_eq!(test::call_service(&service, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn a_successful_partial_refund_settles_immediately() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    seed_admin(&db).await;
    let api = flow_api(&db, &gateway);
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    test::call_service(&service, req).await;
    api.process_payment_update(paid_update("ord-1", "gw-ord-1")).await.unwrap();

    let req = TestRequest::post()
        .uri("/api/payments/refund")
        .insert_header((ADMIN_TOKEN_HEADER, admin_token()))
        .set_json(json!({"order_id": "ord-1", "amount": 10.0, "admin_password": ADMIN_PASSWORD}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let refund: RefundResponse = serde_json::from_str(&body_string(resp).await).unwrap();
    assert!(refund.success);
    assert!(!refund.manual_mode);
    assert_eq!(refund.amount, Gel::from_gel(10));
    assert_eq!(refund.new_status, OrderStatusType::RefundedPartially);
    let recorded = gateway.last_refund().unwrap();
    assert_eq!(recorded.amount, Some(Gel::from_gel(10)));

    let order = api.fetch_order(&OrderId("ord-1".to_string())).await.unwrap();
    let detail = order.refund_detail.unwrap();
    assert_eq!(detail.refunded_amount, Gel::from_gel(10));
    assert_eq!(detail.refunded_by.as_deref(), Some("manager"));
}

#[actix_web::test]
async fn a_refund_with_the_wrong_password_is_forbidden() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    seed_admin(&db).await;
    let api = flow_api(&db, &gateway);
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    test::call_service(&service, req).await;
    api.process_payment_update(paid_update("ord-1", "gw-ord-1")).await.unwrap();

    let req = TestRequest::post()
        .uri("/api/payments/refund")
        .insert_header((ADMIN_TOKEN_HEADER, admin_token()))
        .set_json(json!({"order_id": "ord-1", "admin_password": "not-the-password"}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(gateway.refund_calls(), 0);
    let order = api.fetch_order(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
}

#[actix_web::test]
async fn refunding_an_unpaid_order_is_a_conflict() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    seed_admin(&db).await;
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    test::call_service(&service, req).await;
    let req = TestRequest::post()
        .uri("/api/payments/refund")
        .insert_header((ADMIN_TOKEN_HEADER, admin_token()))
        .set_json(json!({"order_id": "ord-1", "admin_password": ADMIN_PASSWORD}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(gateway.refund_calls(), 0);
}

#[actix_web::test]
async fn admins_advance_fulfilment_but_not_payment_statuses() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let api = flow_api(&db, &gateway);
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    test::call_service(&service, req).await;
    api.process_payment_update(paid_update("ord-1", "gw-ord-1")).await.unwrap();

    let req = TestRequest::put()
        .uri("/api/orders/ord-1/status")
        .insert_header((ADMIN_TOKEN_HEADER, admin_token()))
        .set_json(json!({"status": "preparing"}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(order["status"], "preparing");

    let req = TestRequest::put()
        .uri("/api/orders/ord-1/status")
        .insert_header((ADMIN_TOKEN_HEADER, admin_token()))
        .set_json(json!({"status": "paid"}))
        .to_request();
    assert_eq!(test::call_service(&service, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn a_sync_pass_repairs_a_lost_webhook() {
    let (db, gateway) = (MemoryDatabase::new(), ScriptedGateway::new());
    let service = test::init_service(test_app(&db, &gateway)).await;
    let req = TestRequest::post().uri("/orders").set_json(order_request_json("ord-1")).to_request();
    test::call_service(&service, req).await;
    gateway.set_remote_status("gw-ord-1", RemoteStatus {
        status_text: "performed".to_string(),
        raw: json!({"order_status": "performed"}),
    });

    let req = TestRequest::post()
        .uri("/api/payments/sync")
        .insert_header((ADMIN_TOKEN_HEADER, admin_token()))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(report["examined"], 1);
    assert_eq!(report["updated"], 1);
    let api = flow_api(&db, &gateway);
    let order = api.fetch_order(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
}
