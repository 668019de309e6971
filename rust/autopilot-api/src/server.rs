//! HTTP server setup and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::content::{ContentService, ContentServiceParts};
use crate::database::{
    ArticleRepository, ContentRepository, CreditRepository, ProjectRepository,
    ScheduleRepository, open_store,
};
use crate::ledger::CreditLedger;
use crate::llm::{LlmSettings, OpenAiDriver};
use crate::logging::OpTimer;
use crate::publish::{AyrshareClient, WordPressClient};
use crate::scheduler::{HttpContentPipeline, RunExecutor};
use crate::{AppState, api, gateway, log_banner, log_init_step, log_init_warning};

/// Autopilot API version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

const INIT_STEPS: u32 = 5;

/// Create the application with all routes and middleware.
///
/// The returned state is the one the router serves; callers use it to start
/// the ticker.
pub async fn create_app(config: AppConfig) -> anyhow::Result<(Router, AppState)> {
    let overall_timer = OpTimer::new("server", "create_app");

    log_banner!(
        format!("Autopilot API v{VERSION}"),
        format!("database: {}", config.database.path)
    );

    let state = create_state(config).await?;

    // [5/5] Router
    let step_timer = OpTimer::new("server", "router");
    let app = build_router(state.clone());
    log_init_step!(5, INIT_STEPS, "Router", "routes + middleware configured");
    step_timer.finish();

    overall_timer.finish();
    tracing::info!("Autopilot API server created successfully");

    Ok((app, state))
}

/// Wire stores, clients and services into the shared state.
pub async fn create_state(config: AppConfig) -> anyhow::Result<AppState> {
    let retry = config.retry.policy();

    // [1/5] Database
    let step_timer = OpTimer::new("server", "database");
    let store = open_store(&config.database).await?;
    log_init_step!(1, INIT_STEPS, "Database", &config.database.path);
    step_timer.finish();

    let projects: Arc<dyn ProjectRepository> = Arc::new(store.clone());
    let articles: Arc<dyn ArticleRepository> = Arc::new(store.clone());
    let contents: Arc<dyn ContentRepository> = Arc::new(store.clone());
    let schedules: Arc<dyn ScheduleRepository> = Arc::new(store.clone());
    let credits: Arc<dyn CreditRepository> = Arc::new(store.clone());

    // [2/5] LLM driver
    let step_timer = OpTimer::new("server", "llm");
    let llm_settings = LlmSettings::from(&config.llm);
    let llm_info = format!(
        "{} {}",
        llm_settings.model,
        if llm_settings.api_key.is_some() {
            "(key set)"
        } else {
            "(no API key)"
        }
    );
    if llm_settings.api_key.is_none() {
        log_init_warning!("No LLM API key configured. Content generation will fail.");
    }
    let llm = Arc::new(OpenAiDriver::new(llm_settings, retry.clone())?);
    log_init_step!(2, INIT_STEPS, "LLM", llm_info);
    step_timer.finish();

    // [3/5] Publishers
    let step_timer = OpTimer::new("server", "publishers");
    let wordpress = Arc::new(WordPressClient::new(
        Duration::from_secs(config.server.timeout_secs),
        retry.clone(),
    )?);
    if config.social.api_key.is_none() {
        log_init_warning!("No social API key configured. Social posts will fail.");
    }
    let social = Arc::new(AyrshareClient::new(
        config.social.base_url.clone(),
        config.social.api_key.clone(),
        Duration::from_secs(config.social.timeout_secs),
        retry.clone(),
    )?);
    log_init_step!(3, INIT_STEPS, "Publishers", "wordpress + social");
    step_timer.finish();

    let ledger = CreditLedger::new(credits);
    let content = ContentService::new(ContentServiceParts {
        projects: Arc::clone(&projects),
        articles: Arc::clone(&articles),
        contents: Arc::clone(&contents),
        ledger: ledger.clone(),
        llm,
        wordpress,
        social,
        costs: config.credits.clone(),
        stale_writing_after: config.scheduler.lease(),
    });

    // [4/5] Run executor
    let step_timer = OpTimer::new("server", "executor");
    if config.gateway.cron_secret.is_none() {
        log_init_warning!("No cron secret configured. Cron and internal routes are disabled.");
    }
    let pipeline = Arc::new(HttpContentPipeline::new(
        config.scheduler.internal_base_url.clone(),
        config.gateway.cron_secret.clone(),
        Duration::from_secs(config.scheduler.request_timeout_secs),
        retry,
    )?);
    let executor = Arc::new(RunExecutor::new(
        Arc::clone(&schedules),
        pipeline,
        config.scheduler.lease(),
    ));
    log_init_step!(
        4,
        INIT_STEPS,
        "Run Executor",
        format!("via {}", config.scheduler.internal_base_url)
    );
    step_timer.finish();

    Ok(AppState {
        config: Arc::new(config),
        store,
        projects,
        articles,
        contents,
        schedules,
        ledger,
        content,
        executor,
    })
}

/// Build the router with middleware for the given state.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.timeout_secs);

    Router::new()
        .merge(api::create_router())
        .merge(gateway::create_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gateway::auth::auth_middleware,
        ))
        .with_state(state)
}
