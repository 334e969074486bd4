use log::*;
use spg_common::Secret;

const DEFAULT_API_BASE: &str = "https://api.bog.ge/payments/v1";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.bog.ge/auth/realms/bog/protocol/openid-connect/token";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct IpayConfig {
    pub api_base: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// URL the gateway redirects the shopper back to after payment.
    pub return_url: String,
    /// URL the gateway posts asynchronous status notifications to.
    pub callback_url: String,
    pub merchant_id: Option<String>,
    pub terminal_id: Option<String>,
    pub merchant_name: Option<String>,
    pub merchant_inn: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for IpayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: String::default(),
            client_secret: Secret::default(),
            return_url: String::default(),
            callback_url: String::default(),
            merchant_id: None,
            terminal_id: None,
            merchant_name: None,
            merchant_inn: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl IpayConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_base = std::env::var("IPAY_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let token_url = std::env::var("IPAY_TOKEN_URL").unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string());
        let client_id = std::env::var("IPAY_CLIENT_ID").unwrap_or_else(|_| {
            warn!("IPAY_CLIENT_ID is not set. Gateway calls will fail until it is configured.");
            String::default()
        });
        let client_secret = Secret::new(std::env::var("IPAY_CLIENT_SECRET").unwrap_or_else(|_| {
            warn!("IPAY_CLIENT_SECRET is not set. Gateway calls will fail until it is configured.");
            String::default()
        }));
        let return_url = std::env::var("IPAY_RETURN_URL").unwrap_or_else(|_| {
            warn!("IPAY_RETURN_URL is not set. Shoppers cannot be redirected back to the storefront.");
            String::default()
        });
        let callback_url = std::env::var("IPAY_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("IPAY_CALLBACK_URL is not set. The gateway will not be able to deliver payment notifications.");
            String::default()
        });
        let request_timeout_secs = std::env::var("IPAY_REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        Self {
            api_base,
            token_url,
            client_id,
            client_secret,
            return_url,
            callback_url,
            merchant_id: std::env::var("IPAY_MERCHANT_ID").ok(),
            terminal_id: std::env::var("IPAY_TERMINAL_ID").ok(),
            merchant_name: std::env::var("IPAY_MERCHANT_NAME").ok(),
            merchant_inn: std::env::var("IPAY_CLIENT_INN").ok(),
            request_timeout_secs,
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.reveal().is_empty()
    }
}
