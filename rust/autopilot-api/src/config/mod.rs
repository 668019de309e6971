//! Configuration management for the autopilot API.
//!
//! Configuration is layered: built-in defaults, then `config/autopilot.*`
//! (TOML or YAML), then `AUTOPILOT__*` environment variables, then a handful
//! of well-known variables such as `JWT_SECRET` and `OPENAI_API_KEY`.
//!
//! # Validation
//!
//! ```rust,ignore
//! use autopilot_api::config::{AppConfig, ConfigValidator};
//!
//! let config = AppConfig::load_unchecked()?;
//! ConfigValidator::validate(&config)?;
//! ```

pub mod error;
pub mod validator;

pub use error::{ConfigResult, ConfigurationError};
pub use validator::ConfigValidator;

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Authentication secrets.
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Autopilot trigger and executor settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Social-posting provider.
    #[serde(default)]
    pub social: SocialConfig,
    /// Credit prices for paid actions.
    #[serde(default)]
    pub credits: CreditsConfig,
    /// Retry policy for outbound HTTP calls.
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate configuration.
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::load_unchecked()?;

        ConfigValidator::validate(&config)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{e}"))?;

        Ok(config)
    }

    /// Load configuration without validation.
    pub fn load_unchecked() -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(config::File::with_name("config/autopilot").required(false))
            .add_source(
                config::Environment::with_prefix("AUTOPILOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.apply_env_overrides();
        Ok(app_config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.gateway.jwt_secret = Some(secret);
        }
        if let Ok(secret) = std::env::var("CRON_SECRET") {
            self.gateway.cron_secret = Some(secret);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("AYRSHARE_API_KEY") {
            self.social.api_key = Some(key);
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            self.database.path = path;
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in seconds. Cron runs keep going past it; the
    /// internal item requests do not, so it must cover
    /// `scheduler.request_timeout_secs`.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    900
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HS256 secret for tenant tokens.
    pub jwt_secret: Option<String>,
    /// Bearer secret for the cron trigger and internal endpoints.
    pub cron_secret: Option<String>,
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_secs: u64,
}

fn default_jwt_expiry() -> u64 {
    86400 // 24 hours
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            cron_secret: None,
            jwt_expiry_secs: default_jwt_expiry(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "data/autopilot.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Autopilot scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long a run holds its schedule lease.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    /// In-process trigger interval; 0 disables the ticker and relies on the
    /// external cron endpoint.
    #[serde(default)]
    pub tick_interval_secs: u64,
    /// Base URL the executor uses to reach this service's internal endpoints.
    #[serde(default = "default_internal_base_url")]
    pub internal_base_url: String,
    /// Timeout for each internal generate/publish call.
    #[serde(default = "default_internal_timeout")]
    pub request_timeout_secs: u64,
}

fn default_lease_secs() -> u64 {
    900
}

fn default_internal_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_internal_timeout() -> u64 {
    600
}

impl SchedulerConfig {
    pub fn lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.lease_secs).unwrap_or(i64::MAX / 1000))
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_secs > 0).then(|| Duration::from_secs(self.tick_interval_secs))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lease_secs: default_lease_secs(),
            tick_interval_secs: 0,
            internal_base_url: default_internal_base_url(),
            request_timeout_secs: default_internal_timeout(),
        }
    }
}

/// LLM provider settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    180
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Social-posting provider settings (Ayrshare-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    #[serde(default = "default_social_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_social_timeout")]
    pub timeout_secs: u64,
}

fn default_social_base_url() -> String {
    "https://app.ayrshare.com".to_string()
}

fn default_social_timeout() -> u64 {
    60
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            base_url: default_social_base_url(),
            api_key: None,
            timeout_secs: default_social_timeout(),
        }
    }
}

/// Credit prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditsConfig {
    /// Cost of publishing to WordPress.
    #[serde(default = "default_publish_cost")]
    pub publish_cost: i64,
    /// Cost per social platform.
    #[serde(default = "default_social_post_cost")]
    pub social_post_cost: i64,
}

fn default_publish_cost() -> i64 {
    10
}

fn default_social_post_cost() -> i64 {
    2
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            publish_cost: default_publish_cost(),
            social_post_cost: default_social_post_cost(),
        }
    }
}

/// Outbound retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
