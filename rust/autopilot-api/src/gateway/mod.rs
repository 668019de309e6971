//! HTTP gateway.
//!
//! - [`auth`]: JWT and cron-secret middleware
//! - tenant routes under `/api/v1`: projects, articles, schedules, content, credits
//! - [`cron`] and [`internal`]: routes for the scheduler and billing jobs

pub mod articles;
pub mod auth;
pub mod content;
pub mod credits;
pub mod cron;
pub mod internal;
pub mod projects;
pub mod schedules;

use axum::Router;

use crate::AppState;

/// Create the gateway router with all gateway-specific routes.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(projects::router())
        .merge(articles::router())
        .merge(schedules::router())
        .merge(content::router())
        .merge(credits::router())
        .merge(cron::router())
        .merge(internal::router())
}
