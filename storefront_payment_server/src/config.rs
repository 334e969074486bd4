use std::env;

use chrono::Duration;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use spg_common::Secret;

use crate::errors::ServerError;

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 4880;
const DEFAULT_SESSION_TTL: Duration = Duration::hours(12);
const DEFAULT_WEBHOOK_SIGNATURE_HEADER: &str = "x-ipay-signature";
const DEFAULT_WHATSAPP_API_BASE: &str = "https://graph.facebook.com/v19.0";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub run_mode: RunMode,
    pub auth: AuthConfig,
    pub webhook: WebhookConfig,
    pub whatsapp: WhatsAppConfig,
    /// When set, this admin account is created (or its password reset) at startup.
    pub seed_admin: Option<SeedAdmin>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: String::default(),
            run_mode: RunMode::Production,
            auth: AuthConfig::default(),
            webhook: WebhookConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            seed_admin: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = storefront_payment_engine::sqlite::db_url();
        let run_mode = RunMode::from_env_or_default();
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to \
                 the default configuration."
            );
            AuthConfig::default()
        });
        let webhook = WebhookConfig::from_env_or_default(run_mode);
        let whatsapp = WhatsAppConfig::from_env_or_default();
        let seed_admin = SeedAdmin::from_env();
        Self { host, port, database_url, run_mode, auth, webhook, whatsapp, seed_admin }
    }
}

/// The server's operating mode. Anything that loosens security, such as skipping webhook signature checks, is only
/// honoured in `Development`. An unset or unrecognised `SPG_RUN_MODE` means `Production`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Production,
}

impl RunMode {
    pub fn from_env_or_default() -> Self {
        match env::var("SPG_RUN_MODE").map(|s| s.to_lowercase()) {
            Ok(s) if s == "development" || s == "dev" => RunMode::Development,
            Ok(s) if s == "production" || s == "prod" => RunMode::Production,
            Ok(s) => {
                warn!("🪛️ '{s}' is not a valid SPG_RUN_MODE. Assuming production.");
                RunMode::Production
            },
            Err(_) => RunMode::Production,
        }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The secret used to sign and verify admin session tokens.
    pub jwt_secret: Secret<String>,
    /// How long an admin session token stays valid.
    pub session_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The session signing secret has not been set. I'm using a random value for this session. All \
             admin sessions will be invalidated when the server restarts. Set SPG_JWT_SECRET on production \
             instances. 🚨️🚨️🚨️"
        );
        let secret: String = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect();
        Self { jwt_secret: Secret::new(secret), session_ttl: DEFAULT_SESSION_TTL }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("SPG_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [SPG_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "SPG_JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }
        let session_ttl = env::var("SPG_SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Duration::hours)
            .unwrap_or(DEFAULT_SESSION_TTL);
        Ok(Self { jwt_secret: Secret::new(secret), session_ttl })
    }
}

//-------------------------------------------------  WebhookConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// The shared secret the gateway signs notification bodies with.
    pub hmac_secret: Secret<String>,
    /// The header carrying the HMAC-SHA256 of the request body, hex or base64 encoded.
    pub signature_header: String,
    /// An RSA public key in PEM form. When set, a notification may carry an RS256 bearer token instead of an HMAC
    /// signature.
    pub jwt_public_key: Option<Secret<String>>,
    /// If false, the signature check is skipped entirely. Only possible in development mode.
    pub hmac_checks: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            hmac_secret: Secret::default(),
            signature_header: DEFAULT_WEBHOOK_SIGNATURE_HEADER.to_string(),
            jwt_public_key: None,
            hmac_checks: true,
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default(run_mode: RunMode) -> Self {
        let hmac_secret = Secret::new(env::var("SPG_WEBHOOK_HMAC_SECRET").unwrap_or_else(|_| {
            error!(
                "🪛️ SPG_WEBHOOK_HMAC_SECRET is not set. Incoming payment notifications cannot be verified and will \
                 all be rejected."
            );
            String::default()
        }));
        let signature_header = env::var("SPG_WEBHOOK_SIGNATURE_HEADER")
            .ok()
            .unwrap_or_else(|| DEFAULT_WEBHOOK_SIGNATURE_HEADER.to_string());
        let jwt_public_key = env::var("SPG_WEBHOOK_JWT_PUBLIC_KEY").ok().filter(|k| !k.is_empty()).map(Secret::new);
        let skip_requested = env::var("SPG_SKIP_WEBHOOK_SIGNATURE").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let hmac_checks = match (skip_requested, run_mode) {
            (true, RunMode::Development) => {
                warn!("🚨️ Webhook signature checks are DISABLED. Anyone can mark orders as paid.");
                false
            },
            (true, RunMode::Production) => {
                warn!("🪛️ SPG_SKIP_WEBHOOK_SIGNATURE is ignored in production mode. Signature checks stay on.");
                true
            },
            (false, _) => true,
        };
        Self { hmac_secret, signature_header, jwt_public_key, hmac_checks }
    }
}

//-------------------------------------------------  WhatsAppConfig  ---------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct WhatsAppConfig {
    pub api_base: String,
    /// The WhatsApp Business phone number id messages are sent from.
    pub phone_number_id: String,
    pub access_token: Secret<String>,
    /// The operator number manual-refund alerts go to.
    pub admin_number: Option<String>,
    pub enabled: bool,
}

impl WhatsAppConfig {
    pub fn from_env_or_default() -> Self {
        let api_base = env::var("WHATSAPP_API_BASE").unwrap_or_else(|_| DEFAULT_WHATSAPP_API_BASE.to_string());
        let phone_number_id = env::var("WHATSAPP_PHONE_NUMBER_ID").unwrap_or_default();
        let access_token = Secret::new(env::var("WHATSAPP_ACCESS_TOKEN").unwrap_or_default());
        let admin_number = env::var("WHATSAPP_ADMIN_NUMBER").ok();
        let enabled = !phone_number_id.is_empty() && !access_token.reveal().is_empty();
        if !enabled {
            info!("🪛️ WhatsApp notifications are disabled. Set WHATSAPP_PHONE_NUMBER_ID and WHATSAPP_ACCESS_TOKEN to enable them.");
        }
        Self { api_base, phone_number_id, access_token, admin_number, enabled }
    }
}

//-------------------------------------------------  SeedAdmin  --------------------------------------------------------
#[derive(Clone, Debug)]
pub struct SeedAdmin {
    pub username: String,
    pub password: Secret<String>,
}

impl SeedAdmin {
    pub fn from_env() -> Option<Self> {
        let username = env::var("SPG_ADMIN_USERNAME").ok()?;
        let password = env::var("SPG_ADMIN_PASSWORD").ok()?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self { username, password: Secret::new(password) })
    }
}
