use actix_web::{body::MessageBody, dev::ServiceResponse, test};
use chrono::Duration;
use serde_json::{json, Value};
use spg_common::Secret;
use storefront_payment_engine::{
    db_types::OrderId,
    events::EventProducers,
    status::PaymentUpdate,
    test_utils::{MemoryDatabase, ScriptedGateway},
    PaymentFlowApi,
};

use crate::{auth::TokenIssuer, config::AuthConfig};

// Test-only signing secret. DO NOT re-use anywhere.
const TEST_JWT_SECRET: &str = "0f3a1c-test-secret-not-for-production-9b7d";

pub fn test_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new(TEST_JWT_SECRET.to_string()), session_ttl: Duration::hours(12) }
}

pub fn admin_token() -> String {
    TokenIssuer::new(&test_auth_config()).issue("manager").expect("Failed to issue test token")
}

pub fn flow_api(db: &MemoryDatabase, gateway: &ScriptedGateway) -> PaymentFlowApi<MemoryDatabase, ScriptedGateway> {
    PaymentFlowApi::new(db.clone(), gateway.clone(), EventProducers::default())
}

pub fn order_request_json(order_id: &str) -> Value {
    json!({
        "order_id": order_id,
        "customer": { "first_name": "Giorgi", "last_name": "Kiknadze", "phone": "+995555123456" },
        "address": { "text": "12 Rustaveli Ave, Tbilisi" },
        "items": [
            { "product_id": "ojk-1", "name": "Ojakhuri", "quantity": 2, "unit_price": 18.5 }
        ]
    })
}

pub fn paid_update(order_id: &str, gateway_order_id: &str) -> PaymentUpdate {
    PaymentUpdate {
        order_id: OrderId(order_id.to_string()),
        gateway_order_id: Some(gateway_order_id.to_string()),
        transaction_id: Some(format!("tx-{order_id}")),
        amount: None,
        status_text: "success".to_string(),
        payment_method: Some("card".to_string()),
        refund_actions: Vec::new(),
        raw: json!({"order_status": "success"}),
    }
}

pub async fn body_string<B: MessageBody>(resp: ServiceResponse<B>) -> String {
    let bytes = test::read_body(resp).await;
    String::from_utf8_lossy(&bytes).into_owned()
}
