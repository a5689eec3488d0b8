//! Server configuration.
//!
//! Everything is read once at startup from `CPG_*` environment variables (a `.env` file is honoured) and then handed to
//! the parts of the server that need it. Nothing below the HTTP layer reads the environment.
use std::{env, fmt::Display, net::IpAddr, str::FromStr, time::Duration};

use cpg_common::{helpers::parse_boolean_flag, Secret};
use cpg_engine::TransactionAuthenticator;
use log::*;

use crate::errors::ServerError;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 7001;
const DEFAULT_DATABASE_URL: &str = "sqlite://cpg.db?mode=rwc";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5174";
const DEFAULT_PRODUCT_INFO: &str = "Order";
const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(60);
const DEFAULT_PENDING_TXN_TTL_HOURS: i64 = 24;
const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_millis(5000);
const DEVELOPMENT_JWT_SECRET: &str = "dev_secret_change_me";
pub const CALLBACK_PATH: &str = "/api/payment/gateway/callback";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "" => Ok(Self::Development),
            other => Err(ServerError::ConfigurationError(format!("Unknown environment: {other}"))),
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The public base URL of this server, as configured. `None` means it was derived for local development.
    pub backend_url: Option<String>,
    /// The public base URL of the storefront, as configured.
    pub frontend_url: Option<String>,
    pub gateway: GatewayConfig,
    pub urls: GatewayUrls,
    pub auth: AuthConfig,
    /// Repeated initiations for the same payer and amount inside this window are refused.
    pub dedup_ttl: Duration,
    /// Pending transactions older than this are purged by the sweeper.
    pub pending_txn_ttl: chrono::Duration,
    /// Upper bound on each storage call made while materializing an order.
    pub storage_timeout: Duration,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let urls = GatewayUrls::resolve(None, None, DEFAULT_CPG_PORT, UrlOverrides::default());
        Self {
            environment: Environment::Development,
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            backend_url: None,
            frontend_url: None,
            gateway: GatewayConfig::default(),
            urls,
            auth: AuthConfig::default(),
            dedup_ttl: DEFAULT_DEDUP_TTL,
            pending_txn_ttl: chrono::Duration::hours(DEFAULT_PENDING_TXN_TTL_HOURS),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let environment = env::var("CPG_ENVIRONMENT")
            .ok()
            .and_then(|s| {
                s.parse::<Environment>()
                    .map_err(|e| warn!("🪛️ {e}. Falling back to development mode."))
                    .ok()
            })
            .unwrap_or_default();
        info!("🪛️ Running in {environment} mode");
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = env::var("CPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CPG_PORT. {e} Using the default, {DEFAULT_CPG_PORT}, instead."
                    );
                    DEFAULT_CPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CPG_PORT);
        let database_url = env::var("CPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ CPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let backend_url = non_empty_var("CPG_BACKEND_URL");
        let frontend_url = non_empty_var("CPG_FRONTEND_URL");
        let overrides = UrlOverrides {
            success_callback: non_empty_var("CPG_SUCCESS_CALLBACK_URL"),
            failure_callback: non_empty_var("CPG_FAILURE_CALLBACK_URL"),
            success_redirect: non_empty_var("CPG_SUCCESS_REDIRECT_URL"),
            failure_redirect: non_empty_var("CPG_FAILURE_REDIRECT_URL"),
        };
        let urls = GatewayUrls::resolve(backend_url.as_deref(), frontend_url.as_deref(), port, overrides);
        let gateway = GatewayConfig::from_env_or_defaults();
        let auth = AuthConfig::from_env(environment);
        let dedup_ttl = Duration::from_secs(env_number("CPG_DEDUP_TTL_SECS", DEFAULT_DEDUP_TTL.as_secs()));
        let pending_txn_ttl =
            chrono::Duration::hours(env_number("CPG_PENDING_TXN_TTL_HOURS", DEFAULT_PENDING_TXN_TTL_HOURS));
        let storage_timeout =
            Duration::from_millis(env_number("CPG_STORAGE_TIMEOUT_MS", DEFAULT_STORAGE_TIMEOUT.as_millis() as u64));
        let use_x_forwarded_for = parse_boolean_flag(env::var("CPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("CPG_USE_FORWARDED").ok(), false);
        Self {
            environment,
            host,
            port,
            database_url,
            backend_url,
            frontend_url,
            gateway,
            urls,
            auth,
            dedup_ttl,
            pending_txn_ttl,
            storage_timeout,
            use_x_forwarded_for,
            use_forwarded,
        }
    }

    /// Checks that the configuration is usable. In production every secret and public URL must be set explicitly.
    /// In development, missing gateway credentials are tolerated: the gateway endpoints will answer with a
    /// configuration error until they are supplied.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.database_url.trim().is_empty() {
            return Err(ServerError::ConfigurationError("CPG_DATABASE_URL is empty".to_string()));
        }
        let mut missing = Vec::new();
        if self.gateway.merchant_key.is_blank() {
            missing.push("CPG_GATEWAY_MERCHANT_KEY");
        }
        if self.gateway.salt.is_blank() {
            missing.push("CPG_GATEWAY_SALT");
        }
        if self.backend_url.is_none() {
            missing.push("CPG_BACKEND_URL");
        }
        if self.frontend_url.is_none() {
            missing.push("CPG_FRONTEND_URL");
        }
        if self.auth.jwt_secret.is_none() {
            missing.push("CPG_JWT_SECRET");
        }
        match self.environment {
            Environment::Production if !missing.is_empty() => {
                return Err(ServerError::ConfigurationError(format!(
                    "Missing required configuration for production: {}",
                    missing.join(", ")
                )));
            },
            Environment::Production => {},
            Environment::Development => {
                if self.gateway.authenticator().is_none() {
                    warn!(
                        "🪛️ Gateway credentials are not configured. Payment initiation and gateway callbacks will fail \
                         until CPG_GATEWAY_MERCHANT_KEY and CPG_GATEWAY_SALT are set."
                    );
                }
                if self.auth.jwt_secret.is_none() {
                    return Err(ServerError::ConfigurationError("No JWT secret is available".to_string()));
                }
            },
        }
        self.urls.validate()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_number<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    let value = match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e}. Using the default, {default}.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    };
    value
}

//-------------------------------------------------  GatewayConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub merchant_key: Secret<String>,
    pub salt: Secret<String>,
    /// The `productinfo` value sent with every transaction.
    pub product_info: String,
    /// If supplied, server-to-server callbacks are only accepted from these addresses.
    pub ip_whitelist: Option<Vec<IpAddr>>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            merchant_key: Secret::default(),
            salt: Secret::default(),
            product_info: DEFAULT_PRODUCT_INFO.to_string(),
            ip_whitelist: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_env_or_defaults() -> Self {
        let merchant_key = Secret::new(non_empty_var("CPG_GATEWAY_MERCHANT_KEY").unwrap_or_else(|| {
            error!("🪛️ CPG_GATEWAY_MERCHANT_KEY is not set. Please set it to the merchant key issued by the gateway.");
            String::default()
        }));
        let salt = Secret::new(non_empty_var("CPG_GATEWAY_SALT").unwrap_or_else(|| {
            error!("🪛️ CPG_GATEWAY_SALT is not set. Please set it to the merchant salt issued by the gateway.");
            String::default()
        }));
        let product_info = non_empty_var("CPG_GATEWAY_PRODUCT_INFO").unwrap_or_else(|| DEFAULT_PRODUCT_INFO.into());
        let ip_whitelist = env::var("CPG_GATEWAY_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &ip_whitelist {
            Some(list) if list.is_empty() => warn!(
                "🚨️ The gateway IP whitelist was configured, but is empty. The server will run, but will reject every \
                 gateway callback."
            ),
            Some(list) => {
                let addrs = list.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Gateway IP whitelist: {addrs}");
            },
            None => info!("🪛️ No gateway IP whitelist is set. Only digest verification will be used."),
        }
        Self { merchant_key, salt, product_info, ip_whitelist }
    }

    /// `None` until both the merchant key and the salt are configured.
    pub fn authenticator(&self) -> Option<TransactionAuthenticator> {
        if self.merchant_key.is_blank() || self.salt.is_blank() {
            return None;
        }
        Some(TransactionAuthenticator::new(self.merchant_key.clone(), self.salt.clone()))
    }
}

/// "none", "false", "0" or an empty value disable the whitelist. Invalid entries are skipped.
pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    let s = s.trim();
    if s.is_empty() || ["none", "false", "0"].contains(&s.to_lowercase().as_str()) {
        info!("🪛️ Gateway IP whitelist is disabled.");
        return None;
    }
    let addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse::<IpAddr>()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in CPG_GATEWAY_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect();
    Some(addrs)
}

//-------------------------------------------------   GatewayUrls  -----------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct UrlOverrides {
    pub success_callback: Option<String>,
    pub failure_callback: Option<String>,
    pub success_redirect: Option<String>,
    pub failure_redirect: Option<String>,
}

/// Where the gateway posts its callbacks (`surl`/`furl`), and where customers land afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayUrls {
    pub success_callback: String,
    pub failure_callback: String,
    pub success_redirect: String,
    pub failure_redirect: String,
}

impl GatewayUrls {
    pub fn resolve(backend: Option<&str>, frontend: Option<&str>, port: u16, overrides: UrlOverrides) -> Self {
        let backend = backend.map(|s| s.trim_end_matches('/').to_string()).unwrap_or_else(|| {
            let url = format!("http://localhost:{port}");
            debug!("🪛️ CPG_BACKEND_URL is not set. Using {url}");
            url
        });
        let frontend = frontend.map(|s| s.trim_end_matches('/').to_string()).unwrap_or_else(|| {
            debug!("🪛️ CPG_FRONTEND_URL is not set. Using {DEFAULT_FRONTEND_URL}");
            DEFAULT_FRONTEND_URL.to_string()
        });
        let UrlOverrides { success_callback, failure_callback, success_redirect, failure_redirect } = overrides;
        Self {
            success_callback: success_callback
                .unwrap_or_else(|| format!("{backend}{CALLBACK_PATH}?status=success")),
            failure_callback: failure_callback.unwrap_or_else(|| format!("{backend}{CALLBACK_PATH}?status=fail")),
            success_redirect: success_redirect.unwrap_or_else(|| format!("{frontend}/payment-success")),
            failure_redirect: failure_redirect.unwrap_or_else(|| format!("{frontend}/payment-fail")),
        }
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        for (name, value) in [
            ("success callback", &self.success_callback),
            ("failure callback", &self.failure_callback),
            ("success redirect", &self.success_redirect),
            ("failure redirect", &self.failure_redirect),
        ] {
            url::Url::parse(value)
                .map_err(|e| ServerError::ConfigurationError(format!("The {name} URL ({value}) is invalid. {e}")))?;
        }
        Ok(())
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
/// Tokens are issued by the account service. This server only verifies them, with the shared HS256 secret.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub jwt_secret: Option<Secret<String>>,
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Some(Secret::new(secret.into())) }
    }

    pub fn from_env(environment: Environment) -> Self {
        match (non_empty_var("CPG_JWT_SECRET"), environment) {
            (Some(secret), _) => Self::new(secret),
            (None, Environment::Development) => {
                warn!(
                    "🚨️🚨️🚨️ CPG_JWT_SECRET has not been set. I'm using the well-known development secret. DO NOT \
                     operate on production like this. 🚨️🚨️🚨️"
                );
                Self::new(DEVELOPMENT_JWT_SECRET)
            },
            (None, Environment::Production) => {
                error!("🪛️ CPG_JWT_SECRET is not set.");
                Self::default()
            },
        }
    }
}

//-------------------------------------------------  GatewayOptions  ---------------------------------------------------
/// The non-secret part of the gateway configuration that request handlers need.
#[derive(Clone, Debug)]
pub struct GatewayOptions {
    pub product_info: String,
    pub urls: GatewayUrls,
    pub ip_whitelist: Option<Vec<IpAddr>>,
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    /// Advertised to clients whose initiation was refused as a duplicate.
    pub retry_after_secs: u64,
}

impl GatewayOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            product_info: config.gateway.product_info.clone(),
            urls: config.urls.clone(),
            ip_whitelist: config.gateway.ip_whitelist.clone(),
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            retry_after_secs: config.dedup_ttl.as_secs(),
        }
    }
}

/// The gateway signing credentials, if configured.
#[derive(Clone, Debug)]
pub struct GatewayKeys(Option<TransactionAuthenticator>);

impl GatewayKeys {
    pub fn new(authenticator: Option<TransactionAuthenticator>) -> Self {
        Self(authenticator)
    }

    pub fn authenticator(&self) -> Option<&TransactionAuthenticator> {
        self.0.as_ref()
    }
}
