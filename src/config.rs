use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT signing secret
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: usize,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Payment gateway API key; checkout falls back to COD-only when unset
    #[serde(default)]
    pub payment_gateway_secret: Option<String>,

    /// Shared secret used to verify payment webhook signatures
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Allowed clock skew for webhook timestamps, in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub payment_webhook_tolerance_secs: u64,

    /// Timeout for payment gateway calls, in seconds
    #[serde(default = "default_gateway_timeout")]
    pub payment_gateway_timeout_secs: u64,

    /// Where the gateway redirects the shopper after payment
    #[serde(default = "default_checkout_success_url")]
    pub checkout_success_url: String,

    /// Where the gateway redirects the shopper on cancel
    #[serde(default = "default_checkout_cancel_url")]
    pub checkout_cancel_url: String,

    /// Back-office operator credentials
    #[serde(default)]
    pub seller_email: Option<String>,
    #[serde(default)]
    pub seller_password: Option<String>,

    /// Seed the default coupon set when the table is empty
    #[serde(default = "default_true")]
    pub seed_coupons: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_jwt_expiration() -> usize {
    7 * 24 * 3600
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_webhook_tolerance() -> u64 {
    300
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_checkout_success_url() -> String {
    "http://localhost:5173/loader?next=my-orders".to_string()
}

fn default_checkout_cancel_url() -> String {
    "http://localhost:5173/cart".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Programmatic constructor used by tests and tools.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            payment_gateway_secret: None,
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: default_webhook_tolerance(),
            payment_gateway_timeout_secs: default_gateway_timeout(),
            checkout_success_url: default_checkout_success_url(),
            checkout_cancel_url: default_checkout_cancel_url(),
            seller_email: None,
            seller_password: None,
            seed_coupons: false,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads configuration from `config/default.toml`, the environment-specific
/// file, and `APP_`-prefixed environment variables (highest precedence).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let builder = Config::builder()
        .set_default("environment", environment.clone())?
        .set_default("host", "0.0.0.0")?
        .set_default("database_url", "sqlite://oakline.db?mode=rwc")?
        .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    let cfg: AppConfig = builder.build()?.try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    if cfg.is_production() && cfg.jwt_secret == DEV_DEFAULT_JWT_SECRET {
        return Err(ConfigError::Message(
            "refusing to start production with the development JWT secret".to_string(),
        ));
    }

    info!(environment = %cfg.environment, "configuration loaded");
    Ok(cfg)
}

/// Installs the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmatic_config_has_sane_defaults() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "test_secret_key_for_testing_purposes_only_32chars".into(),
            3600,
            "127.0.0.1".into(),
            18080,
            "test".into(),
        );
        assert!(!cfg.is_production());
        assert_eq!(cfg.server_addr(), "127.0.0.1:18080");
        assert_eq!(cfg.payment_webhook_tolerance_secs, 300);
    }
}
