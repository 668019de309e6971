//! Startup configuration checks.
//!
//! Every rule runs; problems are reported together so an operator can fix a
//! deployment in one pass.

use super::AppConfig;
use super::error::{ConfigResult, ConfigurationError};

/// Minimum accepted length for shared secrets.
const MIN_SECRET_LEN: usize = 32;

/// Validates an [`AppConfig`] before the server starts.
#[derive(Debug)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire application configuration.
    pub fn validate(config: &AppConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();

        errors.extend(Self::validate_secrets(config));
        errors.extend(Self::validate_scheduler(config));
        errors.extend(Self::validate_llm(config));
        errors.extend(Self::validate_credits(config));
        errors.extend(Self::validate_retry(config));

        match ConfigurationError::from_list(errors) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    fn validate_secrets(config: &AppConfig) -> Vec<ConfigurationError> {
        let mut errors = Vec::new();

        match config.gateway.jwt_secret.as_deref() {
            None | Some("") => errors.push(ConfigurationError::missing_required(
                "gateway.jwt_secret",
                "Authenticating tenant requests",
                "JWT_SECRET or AUTOPILOT__GATEWAY__JWT_SECRET",
            )),
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                errors.push(ConfigurationError::invalid(
                    format!("gateway.jwt_secret is {} characters long", secret.len()),
                    format!("Set JWT_SECRET to a random value of at least {MIN_SECRET_LEN} characters"),
                ));
            }
            Some(_) => {}
        }

        if let Some(secret) = config.gateway.cron_secret.as_deref() {
            if secret.len() < MIN_SECRET_LEN {
                errors.push(ConfigurationError::invalid(
                    format!("gateway.cron_secret is {} characters long", secret.len()),
                    format!("Set CRON_SECRET to a random value of at least {MIN_SECRET_LEN} characters"),
                ));
            }
        }

        errors
    }

    fn validate_scheduler(config: &AppConfig) -> Vec<ConfigurationError> {
        let mut errors = Vec::new();
        let scheduler = &config.scheduler;

        // The executor authenticates its loopback calls with the cron secret.
        if scheduler.tick_interval_secs > 0 && config.gateway.cron_secret.is_none() {
            errors.push(ConfigurationError::missing_required(
                "gateway.cron_secret",
                "The in-process scheduler ticker",
                "CRON_SECRET, or set AUTOPILOT__SCHEDULER__TICK_INTERVAL_SECS=0",
            ));
        }

        if scheduler.lease_secs < scheduler.request_timeout_secs {
            errors.push(ConfigurationError::incompatible(
                format!("scheduler.lease_secs={}", scheduler.lease_secs),
                format!(
                    "scheduler.request_timeout_secs={}",
                    scheduler.request_timeout_secs
                ),
                "A run lease shorter than a single item request can expire mid-run. \
                Set lease_secs to at least request_timeout_secs.",
            ));
        }

        // The server timeout also bounds the internal endpoints the executor calls.
        if config.server.timeout_secs < scheduler.request_timeout_secs {
            errors.push(ConfigurationError::incompatible(
                format!("server.timeout_secs={}", config.server.timeout_secs),
                format!(
                    "scheduler.request_timeout_secs={}",
                    scheduler.request_timeout_secs
                ),
                "The server would cut off internal item requests before the executor gives up on them. \
                Set server.timeout_secs to at least request_timeout_secs.",
            ));
        }

        let llm_worst_case = Self::llm_worst_case_secs(config);
        if llm_worst_case > scheduler.request_timeout_secs {
            errors.push(ConfigurationError::incompatible(
                format!("scheduler.request_timeout_secs={}", scheduler.request_timeout_secs),
                format!(
                    "llm.timeout_secs={} with retry.max_attempts={}",
                    config.llm.timeout_secs, config.retry.max_attempts
                ),
                format!(
                    "A generate call can take up to {llm_worst_case}s with retries. \
                    Raise request_timeout_secs or lower the LLM timeout or attempts."
                ),
            ));
        }

        if let Err(e) = url::Url::parse(&scheduler.internal_base_url) {
            errors.push(ConfigurationError::invalid(
                format!(
                    "scheduler.internal_base_url '{}' is not a URL: {e}",
                    scheduler.internal_base_url
                ),
                "Set AUTOPILOT__SCHEDULER__INTERNAL_BASE_URL to this service's address, \
                e.g. http://127.0.0.1:8080",
            ));
        }

        errors
    }

    /// Longest a single LLM completion can take: every attempt times out and
    /// every backoff hits the cap.
    fn llm_worst_case_secs(config: &AppConfig) -> u64 {
        let attempts = u64::from(config.retry.max_attempts.max(1));
        let backoff_secs = config.retry.max_backoff_ms.div_ceil(1000);
        config
            .llm
            .timeout_secs
            .saturating_mul(attempts)
            .saturating_add(backoff_secs.saturating_mul(attempts - 1))
    }

    fn validate_llm(config: &AppConfig) -> Vec<ConfigurationError> {
        let mut errors = Vec::new();

        if config.llm.api_key.as_deref().is_none_or(str::is_empty) {
            errors.push(ConfigurationError::missing_required(
                "llm.api_key",
                "Generating article content",
                "OPENAI_API_KEY or AUTOPILOT__LLM__API_KEY",
            ));
        }
        if let Err(e) = url::Url::parse(&config.llm.base_url) {
            errors.push(ConfigurationError::invalid(
                format!("llm.base_url '{}' is not a URL: {e}", config.llm.base_url),
                "Set AUTOPILOT__LLM__BASE_URL to an OpenAI-compatible endpoint",
            ));
        }

        errors
    }

    fn validate_credits(config: &AppConfig) -> Vec<ConfigurationError> {
        let mut errors = Vec::new();
        let credits = &config.credits;

        if credits.publish_cost < 0 {
            errors.push(ConfigurationError::invalid(
                format!("credits.publish_cost is negative ({})", credits.publish_cost),
                "Set AUTOPILOT__CREDITS__PUBLISH_COST to 0 or more",
            ));
        }
        if credits.social_post_cost < 0 {
            errors.push(ConfigurationError::invalid(
                format!(
                    "credits.social_post_cost is negative ({})",
                    credits.social_post_cost
                ),
                "Set AUTOPILOT__CREDITS__SOCIAL_POST_COST to 0 or more",
            ));
        }

        errors
    }

    fn validate_retry(config: &AppConfig) -> Vec<ConfigurationError> {
        let mut errors = Vec::new();
        let retry = &config.retry;

        if retry.max_attempts == 0 {
            errors.push(ConfigurationError::invalid(
                "retry.max_attempts is 0",
                "Set AUTOPILOT__RETRY__MAX_ATTEMPTS to 1 or more (1 disables retries)",
            ));
        }
        if retry.multiplier < 1.0 {
            errors.push(ConfigurationError::invalid(
                format!("retry.multiplier is {}", retry.multiplier),
                "Set AUTOPILOT__RETRY__MULTIPLIER to 1.0 or more",
            ));
        }
        if retry.initial_backoff_ms > retry.max_backoff_ms {
            errors.push(ConfigurationError::incompatible(
                format!("retry.initial_backoff_ms={}", retry.initial_backoff_ms),
                format!("retry.max_backoff_ms={}", retry.max_backoff_ms),
                "The first backoff cannot exceed the backoff cap. Lower initial_backoff_ms.",
            ));
        }

        errors
    }
}
