//! Admin session tokens and password hashing.
//!
//! A successful login issues a short-lived HS256 JWT. Subsequent admin requests present it in the
//! [`ADMIN_TOKEN_HEADER`] header (or as a `Bearer` token), where the ACL middleware validates it and stashes the
//! claims in the request extensions.
//!
//! Passwords are stored as `salt:hex(hmac_sha256(salt, password))`. No admin account is ever created through the
//! public API without an already-authenticated session; the first account is seeded from the environment.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use spg_common::Secret;

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
    helpers::{calculate_hmac, verify_hmac},
};

pub const ADMIN_TOKEN_HEADER: &str = "spg_access_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    /// The admin username.
    pub sub: String,
    /// Expiry, as a unix timestamp.
    pub exp: i64,
}

/// Issues admin session tokens. One instance is shared with the login route via `web::Data`.
#[derive(Clone)]
pub struct TokenIssuer {
    config: AuthConfig,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { config: config.clone() }
    }

    pub fn issue(&self, username: &str) -> Result<String, ServerError> {
        let exp = (Utc::now() + self.config.session_ttl).timestamp();
        let claims = AdminClaims { sub: username.to_string(), exp };
        let key = EncodingKey::from_secret(self.config.jwt_secret.reveal().as_bytes());
        encode(&Header::default(), &claims, &key).map_err(|e| ServerError::CouldNotSerializeSessionToken(e.to_string()))
    }
}

/// Validate a session token and return its claims. Expiry is enforced by the JWT validation itself.
pub fn validate_session_token(token: &str, secret: &Secret<String>) -> Result<AdminClaims, AuthError> {
    let key = DecodingKey::from_secret(secret.reveal().as_bytes());
    let data = decode::<AdminClaims>(token, &key, &Validation::new(Algorithm::HS256))
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;
    Ok(data.claims)
}

pub fn hash_password(password: &str) -> String {
    let salt: String = thread_rng().sample_iter(&Alphanumeric).take(16).map(char::from).collect();
    let digest = calculate_hmac(&salt, password.as_bytes());
    format!("{salt}:{digest}")
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Some((salt, digest)) = stored_hash.split_once(':') else {
        return false;
    };
    verify_hmac(salt, password.as_bytes(), digest)
}
