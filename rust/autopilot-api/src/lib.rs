//! Autopilot API - multi-tenant content autopilot
//!
//! Tenants register publishing projects, queue articles, and attach them to
//! schedules. When a schedule comes due the run executor generates each
//! queued article with an LLM and publishes the result to WordPress and to
//! social platforms, charging the tenant's credit balance for every publish.
//!
//! # Architecture
//!
//! - [`config`]: layered configuration and validation
//! - [`domain`]: projects, articles, content, schedules and credits
//! - [`database`]: repository traits and the SQLite store
//! - [`scheduler`]: next-run calculation, the run executor and the ticker
//! - [`content`]: generate and publish, the paid actions
//! - [`ledger`]: credit balance checks, debits and grants
//! - [`llm`]: chat-completion driver, prompt and response parsing
//! - [`publish`]: WordPress and social-posting clients
//! - [`gateway`]: authenticated HTTP routes
//! - [`api`]: health endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use autopilot_api::{config::AppConfig, server::create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let (app, _state) = create_app(config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod config;
pub mod content;
pub mod database;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod llm;
pub mod logging;
pub mod publish;
pub mod retry;
pub mod scheduler;
pub mod server;

use std::sync::Arc;

use config::AppConfig;
use content::ContentService;
use database::{
    ArticleRepository, ContentRepository, ProjectRepository, ScheduleRepository, SqliteStore,
};
use ledger::CreditLedger;
use scheduler::RunExecutor;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Concrete store, kept for readiness checks.
    pub store: SqliteStore,
    pub projects: Arc<dyn ProjectRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub contents: Arc<dyn ContentRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    /// Credit balances and history.
    pub ledger: CreditLedger,
    /// Generate and publish.
    pub content: ContentService,
    /// Shared with the ticker when one is running.
    pub executor: Arc<RunExecutor>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"AppConfig")
            .field("store", &self.store)
            .field("ledger", &self.ledger)
            .field("content", &self.content)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
