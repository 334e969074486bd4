//! Webhook signature middleware.
//!
//! The gateway signs each notification delivery with HMAC-SHA256 over the raw request body, using the shared webhook
//! secret as the key, and puts the digest (hex or base64 encoded) in a header (`x-ipay-signature` by default).
//! Deployments that have been issued an RSA public key by the gateway can also accept an RS256 bearer token in the
//! `Authorization` header in place of the HMAC signature.
//!
//! This middleware wraps the webhook routes, checks the credentials before any parsing happens, and re-injects the
//! consumed body so the handler can still read it. Requests that fail verification are rejected with a 401 and never
//! reach the payment engine.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorUnauthorized},
    http::header::AUTHORIZATION,
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::{trace, warn};
use spg_common::Secret;

use crate::{config::WebhookConfig, helpers::verify_hmac};

pub struct SignatureMiddlewareFactory {
    signature_header: String,
    key: Secret<String>,
    jwt_public_key: Option<Secret<String>>,
    // If false, then the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl SignatureMiddlewareFactory {
    pub fn new(config: &WebhookConfig) -> Self {
        SignatureMiddlewareFactory {
            signature_header: config.signature_header.clone(),
            key: config.hmac_secret.clone(),
            jwt_public_key: config.jwt_public_key.clone(),
            enabled: config.hmac_checks,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureMiddlewareService {
            signature_header: self.signature_header.clone(),
            key: self.key.clone(),
            jwt_public_key: self.jwt_public_key.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct SignatureMiddlewareService<S> {
    signature_header: String,
    key: Secret<String>,
    jwt_public_key: Option<Secret<String>>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.key.reveal().clone();
        let signature_header = self.signature_header.clone();
        let jwt_public_key = self.jwt_public_key.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature for request");
            if !enabled {
                trace!("🔐️ Webhook signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            if secret.is_empty() && jwt_public_key.is_none() {
                warn!("🔐️ No webhook secret or public key is configured. Denying access.");
                return Err(ErrorUnauthorized("Webhook signatures cannot be verified."));
            }
            if let Some(key) = &jwt_public_key {
                if let Some(token) = bearer_token(&req) {
                    return if verify_bearer(key, &token) {
                        trace!("🔐️ Webhook bearer token check ✅️");
                        service.call(req).await
                    } else {
                        warn!("🔐️ Invalid bearer token on webhook request. Denying access.");
                        Err(ErrorUnauthorized("Invalid token."))
                    };
                }
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let signature = req
                .headers()
                .get(&signature_header)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    warn!("🔐️ No signature found in request. Denying access.");
                    ErrorUnauthorized("No signature found.")
                })?;
            if !secret.is_empty() && verify_hmac(&secret, data.as_ref(), signature) {
                trace!("🔐️ Webhook signature check ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid signature found in request. Denying access.");
                Err(ErrorUnauthorized("Invalid signature."))
            }
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|t| t.trim().to_string())
}

/// Check an RS256 token against the gateway's public key. Only the signature and expiry matter; the gateway does
/// not put claims we rely on in the token.
fn verify_bearer(public_key: &Secret<String>, token: &str) -> bool {
    let Ok(key) = DecodingKey::from_rsa_pem(public_key.reveal().as_bytes()) else {
        warn!("🔐️ The configured webhook public key is not a valid RSA PEM.");
        return false;
    };
    let validation = Validation::new(Algorithm::RS256);
    decode::<serde_json::Value>(token, &key, &validation).is_ok()
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
