//! Admin access control middleware.
//!
//! This middleware wraps the `/api` scope. It checks the incoming request for a valid admin session token, either
//! in the [`ADMIN_TOKEN_HEADER`](crate::auth::ADMIN_TOKEN_HEADER) header or as an `Authorization: Bearer` token.
//! If the token validates, the claims are inserted into the request extensions where handlers can pick them up with
//! `web::ReqData<AdminClaims>`. Otherwise a 401 Unauthorized response is returned.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::debug;
use spg_common::Secret;

use crate::{
    auth::{validate_session_token, ADMIN_TOKEN_HEADER},
    config::AuthConfig,
};

pub struct AclMiddlewareFactory {
    jwt_secret: Secret<String>,
}

impl AclMiddlewareFactory {
    pub fn new(config: &AuthConfig) -> Self {
        AclMiddlewareFactory { jwt_secret: config.jwt_secret.clone() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { jwt_secret: self.jwt_secret.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    jwt_secret: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let jwt_secret = self.jwt_secret.clone();
        Box::pin(async move {
            let token = extract_token(&req).ok_or_else(|| {
                log::warn!("🔐️ No admin session token found in request. Denying access.");
                ErrorUnauthorized("No admin session token provided.")
            })?;
            let claims = validate_session_token(&token, &jwt_secret).map_err(|e| {
                log::warn!("🔐️ Invalid admin session token. {e}");
                ErrorUnauthorized("Invalid admin session token.")
            })?;
            debug!("🔐️ Admin request authorised for '{}'", claims.sub);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(token) = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(token.to_string());
    }
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}
