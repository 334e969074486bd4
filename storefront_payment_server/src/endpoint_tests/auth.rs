use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use serde_json::json;
use storefront_payment_engine::{db_types::AdminUser, AuthApi};

use crate::{
    auth::{hash_password, validate_session_token, TokenIssuer, ADMIN_TOKEN_HEADER},
    data_objects::LoginResponse,
    endpoint_tests::{
        helpers::{admin_token, body_string, test_auth_config},
        mocks::MockAuthManager,
    },
    middleware::AclMiddlewareFactory,
    routes::{CheckTokenRoute, LoginRoute},
};

fn stored_admin(password: &str) -> AdminUser {
    AdminUser {
        id: 1,
        username: "manager".to_string(),
        password_hash: hash_password(password),
        created_at: chrono::Utc::now(),
    }
}

async fn post_login(auth: MockAuthManager, body: serde_json::Value) -> (StatusCode, String) {
    let config = test_auth_config();
    let app = App::new()
        .app_data(web::Data::new(AuthApi::new(auth)))
        .app_data(web::Data::new(TokenIssuer::new(&config)))
        .service(LoginRoute::<MockAuthManager>::new());
    let service = test::init_service(app).await;
    let req = TestRequest::post().uri("/auth/login").set_json(body).to_request();
    let resp = test::call_service(&service, req).await;
    let status = resp.status();
    (status, body_string(resp).await)
}

#[actix_web::test]
async fn login_issues_a_valid_session_token() {
    let mut auth = MockAuthManager::new();
    auth.expect_fetch_admin_user().returning(|_| Ok(Some(stored_admin("kharcho123"))));
    let (status, body) = post_login(auth, json!({"username": "manager", "password": "kharcho123"})).await;
    assert_eq!(status, StatusCode::OK);
    let response: LoginResponse = serde_json::from_str(&body).unwrap();
    let claims = validate_session_token(&response.token, &test_auth_config().jwt_secret).unwrap();
    assert_eq!(claims.sub, "manager");
}

#[actix_web::test]
async fn login_rejects_a_wrong_password() {
    let mut auth = MockAuthManager::new();
    auth.expect_fetch_admin_user().returning(|_| Ok(Some(stored_admin("kharcho123"))));
    let (status, body) = post_login(auth, json!({"username": "manager", "password": "wrong"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Invalid username or password"));
}

#[actix_web::test]
async fn login_rejects_an_unknown_user_with_the_same_error() {
    let mut auth = MockAuthManager::new();
    auth.expect_fetch_admin_user().returning(|_| Ok(None));
    let (status, body) = post_login(auth, json!({"username": "nobody", "password": "kharcho123"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Invalid username or password"));
}

#[actix_web::test]
async fn admin_scope_requires_a_valid_token() {
    let config = test_auth_config();
    let app = App::new()
        .service(web::scope("/api").wrap(AclMiddlewareFactory::new(&config)).service(CheckTokenRoute::new()));
    let service = test::init_service(app).await;

    let req = TestRequest::get().uri("/api/check_token").to_request();
    let status = test::try_call_service(&service, req)
        .await
        .map_or_else(|e| e.error_response().status(), |resp| resp.status());
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::get()
        .uri("/api/check_token")
        .insert_header((ADMIN_TOKEN_HEADER, "not-a-token"))
        .to_request();
    let status = test::try_call_service(&service, req)
        .await
        .map_or_else(|e| e.error_response().status(), |resp| resp.status());
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::get()
        .uri("/api/check_token")
        .insert_header((ADMIN_TOKEN_HEADER, admin_token()))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    assert!(body.contains("Session for 'manager' is valid"));
}

#[actix_web::test]
async fn bearer_tokens_are_accepted_too() {
    let config = test_auth_config();
    let app = App::new()
        .service(web::scope("/api").wrap(AclMiddlewareFactory::new(&config)).service(CheckTokenRoute::new()));
    let service = test::init_service(app).await;
    let req = TestRequest::get()
        .uri("/api/check_token")
        .insert_header(("Authorization", format!("Bearer {}", admin_token())))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
