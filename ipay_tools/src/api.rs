use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    StatusCode,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::IpayConfig,
    data_objects::{CreateOrderRequest, CreateOrderResponse},
    error::IpayApiError,
};

/// A named, ordered list of candidate endpoint paths for one gateway operation.
///
/// The deployed iPay surface diverges from its documentation by tenant and API generation, so each operation probes
/// its candidates in order: stop on the first 2xx, move to the next candidate only when the response status is in
/// `try_next_on`, and abort on any other error status. New candidates are data, not control flow.
#[derive(Debug, Clone, Copy)]
pub struct EndpointStrategy {
    pub label: &'static str,
    /// Path templates relative to the API base. `{id}` is substituted before the request is sent.
    pub paths: &'static [&'static str],
    pub try_next_on: &'static [StatusCode],
}

pub const CREATE_ORDER_ENDPOINTS: EndpointStrategy = EndpointStrategy {
    label: "order creation",
    paths: &["/ecommerce/orders", "/checkout/orders", "/orders"],
    try_next_on: &[StatusCode::NOT_FOUND],
};

pub const ORDER_QUERY_ENDPOINTS: EndpointStrategy = EndpointStrategy {
    label: "order query",
    paths: &["/orders/{id}", "/ecommerce/orders/{id}", "/checkout/orders/{id}"],
    try_next_on: &[StatusCode::NOT_FOUND],
};

// The singular form is the documented-correct path; the plural forms are legacy API generations that some tenants
// still serve. Legacy deployments answer 405 as well as 404 for paths they do not serve.
pub const REFUND_ENDPOINTS: EndpointStrategy = EndpointStrategy {
    label: "refund",
    paths: &["/payment/refund/{id}", "/payments/refund/{id}", "/refund/{id}"],
    try_next_on: &[StatusCode::NOT_FOUND, StatusCode::METHOD_NOT_ALLOWED],
};

/// Shaved off the gateway's stated token lifetime so a token is never presented right at its expiry.
const TOKEN_EXPIRY_SLACK_SECS: i64 = 60;
/// Assumed lifetime when the token response carries no `expires_in`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 600;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub idempotency_key: Option<String>,
    pub accept_language: Option<String>,
}

impl RequestOptions {
    pub fn with_idempotency_key(key: impl Into<String>) -> Self {
        Self { idempotency_key: Some(key.into()), accept_language: None }
    }
}

#[derive(Clone)]
pub struct IpayApi {
    config: IpayConfig,
    client: Arc<Client>,
    token_cache: Arc<Mutex<Option<CachedToken>>>,
    /// Per-operation index of the first candidate path that answered, keyed by strategy label.
    resolved_paths: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl IpayApi {
    pub fn new(config: IpayConfig) -> Result<Self, IpayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| IpayApiError::Initialization(e.to_string()))?;
        Ok(Self {
            config,
            client: Arc::new(client),
            token_cache: Arc::new(Mutex::new(None)),
            resolved_paths: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &IpayConfig {
        &self.config
    }

    /// Obtain an OAuth access token using the client-credentials grant.
    ///
    /// Tokens are cached until shortly before their stated expiry; a 401 from the gateway invalidates the cache
    /// and the operation re-authenticates once. HTTP Basic auth is tried first; some tenants only accept the
    /// credentials in the form body, so a non-2xx response triggers one retry in that shape.
    pub async fn access_token(&self) -> Result<String, IpayApiError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        let (token, ttl_secs) = self.fetch_token().await?;
        self.store_token(token.clone(), ttl_secs);
        Ok(token)
    }

    fn cached_token(&self) -> Option<String> {
        let cache = self.token_cache.lock().unwrap();
        cache.as_ref().filter(|t| t.expires_at > Utc::now()).map(|t| t.token.clone())
    }

    fn store_token(&self, token: String, ttl_secs: i64) {
        let lifetime = (ttl_secs - TOKEN_EXPIRY_SLACK_SECS).max(0);
        let expires_at = Utc::now() + chrono::Duration::seconds(lifetime);
        *self.token_cache.lock().unwrap() = Some(CachedToken { token, expires_at });
    }

    fn invalidate_token(&self) {
        self.token_cache.lock().unwrap().take();
    }

    async fn fetch_token(&self) -> Result<(String, i64), IpayApiError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: Option<String>,
            expires_in: Option<i64>,
        }
        if !self.config.has_credentials() {
            return Err(IpayApiError::MissingCredentials);
        }
        trace!("🏦️ Requesting access token from {}", self.config.token_url);
        let primary = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.reveal()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| IpayApiError::RestResponseError(e.to_string()))?;
        let response = if primary.status().is_success() {
            primary
        } else {
            debug!("🏦️ Basic-auth token request returned {}. Retrying with credentials in the body.", primary.status());
            let fallback = self
                .client
                .post(&self.config.token_url)
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", self.config.client_id.as_str()),
                    ("client_secret", self.config.client_secret.reveal().as_str()),
                ])
                .send()
                .await
                .map_err(|e| IpayApiError::RestResponseError(e.to_string()))?;
            if !fallback.status().is_success() {
                let status = fallback.status().as_u16();
                let message = fallback.text().await.unwrap_or_default();
                return Err(IpayApiError::TokenError { status, message });
            }
            fallback
        };
        let token = response.json::<TokenResponse>().await.map_err(|e| IpayApiError::JsonError(e.to_string()))?;
        let ttl_secs = token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        token.access_token.map(|t| (t, ttl_secs)).ok_or(IpayApiError::TokenMissing)
    }

    /// Create a remote payment order. Probes [`CREATE_ORDER_ENDPOINTS`] in sequence.
    pub async fn create_order(
        &self,
        payload: &CreateOrderRequest,
        opts: &RequestOptions,
    ) -> Result<CreateOrderResponse, IpayApiError> {
        let body = serde_json::to_value(payload).map_err(|e| IpayApiError::JsonError(e.to_string()))?;
        debug!("🏦️ Creating gateway order for [{}]", payload.external_order_id);
        let value = self.authed_probe(CREATE_ORDER_ENDPOINTS, Method::POST, None, Some(&body), opts).await?;
        info!("🏦️ Gateway order created for [{}]", payload.external_order_id);
        Ok(CreateOrderResponse(value))
    }

    /// Query the remote status of a gateway order. Probes [`ORDER_QUERY_ENDPOINTS`] in sequence.
    pub async fn get_order(&self, gateway_order_id: &str) -> Result<Value, IpayApiError> {
        trace!("🏦️ Fetching gateway order {gateway_order_id}");
        self.authed_probe(ORDER_QUERY_ENDPOINTS, Method::GET, Some(gateway_order_id), None, &RequestOptions::default())
            .await
    }

    /// Issue a refund against a gateway order. `amount` is decimal GEL; `None` requests a full refund.
    ///
    /// Probes [`REFUND_ENDPOINTS`] in sequence and maps exhaustion to [`IpayApiError::RefundEndpointNotFound`] so
    /// callers can distinguish "no refund API available" from an outright rejection.
    pub async fn refund_order(
        &self,
        gateway_order_id: &str,
        external_order_id: &str,
        amount: Option<f64>,
        opts: &RequestOptions,
    ) -> Result<Value, IpayApiError> {
        let mut body = serde_json::json!({ "external_order_id": external_order_id });
        if let Some(amount) = amount {
            body["amount"] = serde_json::json!(amount);
        }
        debug!(
            "🏦️ Requesting {} refund of gateway order {gateway_order_id} for [{external_order_id}]",
            amount.map(|a| format!("{a:.2} GEL")).unwrap_or_else(|| "full".to_string())
        );
        match self.authed_probe(REFUND_ENDPOINTS, Method::POST, Some(gateway_order_id), Some(&body), opts).await {
            Ok(value) => {
                info!("🏦️ Refund accepted by gateway for [{external_order_id}]");
                Ok(value)
            },
            Err(IpayApiError::EndpointsExhausted { last, .. }) => Err(IpayApiError::RefundEndpointNotFound { last }),
            Err(e) => Err(e),
        }
    }

    /// Run a probed request with the cached access token, re-authenticating once if the gateway rejects it.
    async fn authed_probe(
        &self,
        strategy: EndpointStrategy,
        method: Method,
        id: Option<&str>,
        body: Option<&Value>,
        opts: &RequestOptions,
    ) -> Result<Value, IpayApiError> {
        let token = self.access_token().await?;
        match self.probe(strategy, method.clone(), id, &token, body, opts).await {
            Err(IpayApiError::QueryError { status: 401, .. }) => {
                debug!("🏦️ The gateway rejected the access token. Re-authenticating once.");
                self.invalidate_token();
                let token = self.access_token().await?;
                self.probe(strategy, method, id, &token, body, opts).await
            },
            other => other,
        }
    }

    fn resolved_path(&self, label: &'static str) -> usize {
        self.resolved_paths.lock().unwrap().get(label).copied().unwrap_or(0)
    }

    fn remember_path(&self, label: &'static str, idx: usize) {
        self.resolved_paths.lock().unwrap().insert(label, idx);
    }

    /// Run one request against each candidate path of `strategy` until one answers with a 2xx. The index of the
    /// path that answered is remembered per operation, and later calls start probing there.
    async fn probe(
        &self,
        strategy: EndpointStrategy,
        method: Method,
        id: Option<&str>,
        token: &str,
        body: Option<&Value>,
        opts: &RequestOptions,
    ) -> Result<Value, IpayApiError> {
        let mut last = String::from("no endpoints attempted");
        let start = self.resolved_path(strategy.label);
        for (idx, path) in strategy.paths.iter().enumerate().skip(start) {
            let path = match id {
                Some(id) => path.replace("{id}", id),
                None => (*path).to_string(),
            };
            let url = format!("{}{}", self.config.api_base, path);
            trace!("🏦️ Trying {} candidate {url}", strategy.label);
            let mut req = self.client.request(method.clone(), &url).bearer_auth(token);
            if let Some(body) = body {
                req = req.json(body);
            }
            if let Some(key) = &opts.idempotency_key {
                req = req.header("Idempotency-Key", key);
            }
            if let Some(lang) = &opts.accept_language {
                req = req.header("Accept-Language", lang);
            }
            let response = req.send().await.map_err(|e| IpayApiError::RestResponseError(e.to_string()))?;
            let status = response.status();
            if status.is_success() {
                trace!("🏦️ {} candidate {url} answered {status}", strategy.label);
                self.remember_path(strategy.label, idx);
                return response.json::<Value>().await.map_err(|e| IpayApiError::JsonError(e.to_string()));
            }
            let message = response.text().await.unwrap_or_default();
            if strategy.try_next_on.contains(&status) {
                debug!("🏦️ {} candidate {url} answered {status}. Trying the next candidate.", strategy.label);
                last = format!("{} {message}", status.as_u16());
                continue;
            }
            // Anything other than a "try next" status is a real answer from the gateway, so stop probing.
            return Err(IpayApiError::QueryError { status: status.as_u16(), message });
        }
        Err(IpayApiError::EndpointsExhausted { label: strategy.label, last })
    }
}
