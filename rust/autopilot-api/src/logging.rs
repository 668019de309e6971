//! Logging setup and startup helpers.
//!
//! [`init_tracing`] installs the global subscriber. [`OpTimer`] and the
//! `log_*` macros give startup and long-running operations a consistent
//! shape in the logs (`component`, `operation`, `duration_ms`).

use std::time::Instant;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Measures one operation and logs its outcome with `duration_ms`.
///
/// ```rust,ignore
/// let timer = OpTimer::new("database", "open");
/// let store = SqliteStore::open(path).await;
/// timer.finish_with_result(store.as_ref());
/// ```
#[derive(Debug)]
pub struct OpTimer {
    component: &'static str,
    operation: String,
    start: Instant,
}

impl OpTimer {
    pub fn new(component: &'static str, operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!(component, operation = %operation, "Operation started");
        Self {
            component,
            operation,
            start: Instant::now(),
        }
    }

    /// Milliseconds since the timer started.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn finish(self) {
        tracing::info!(
            component = self.component,
            operation = %self.operation,
            duration_ms = self.elapsed_ms(),
            "Operation completed"
        );
    }

    /// Log success or failure depending on `result`.
    pub fn finish_with_result<T, E: std::fmt::Display>(self, result: Result<&T, &E>) {
        let duration_ms = self.elapsed_ms();
        match result {
            Ok(_) => tracing::info!(
                component = self.component,
                operation = %self.operation,
                duration_ms,
                "Operation completed"
            ),
            Err(e) => tracing::error!(
                component = self.component,
                operation = %self.operation,
                duration_ms,
                error = %e,
                "Operation failed"
            ),
        }
    }
}

/// Log a numbered startup step.
///
/// ```rust,ignore
/// log_init_step!(2, 5, "Database", "data/autopilot.db");
/// ```
#[macro_export]
macro_rules! log_init_step {
    ($step:expr, $total:expr, $name:expr, $detail:expr) => {
        tracing::info!(step = $step, total = $total, "[{}/{}] {}: {}", $step, $total, $name, $detail);
    };
    ($step:expr, $total:expr, $name:expr) => {
        tracing::info!(step = $step, total = $total, "[{}/{}] {}", $step, $total, $name);
    };
}

/// Log a non-fatal startup problem.
#[macro_export]
macro_rules! log_init_warning {
    ($($arg:tt)*) => {
        tracing::warn!("startup: {}", format!($($arg)*));
    };
}

/// Log a framed banner line, used once at startup and once at shutdown.
#[macro_export]
macro_rules! log_banner {
    ($title:expr) => {
        tracing::info!("==== {} ====", $title);
    };
    ($title:expr, $subtitle:expr) => {
        tracing::info!("==== {} ({}) ====", $title, $subtitle);
    };
}
