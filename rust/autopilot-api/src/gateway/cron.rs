//! Cron trigger endpoint.
//!
//! `POST /api/cron/autopilot` runs every due schedule. Guarded by the cron
//! secret in [`super::auth`].

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;

use crate::AppState;
use crate::error::AppResult;
use crate::logging::OpTimer;
use crate::scheduler::CronSummary;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/cron/autopilot", post(run_autopilot))
}

/// `POST /api/cron/autopilot`
///
/// The run continues in the background if the request is cut off.
pub async fn run_autopilot(State(state): State<AppState>) -> AppResult<Json<CronSummary>> {
    let timer = OpTimer::new("cron", "run_autopilot");
    let result = Arc::clone(&state.executor)
        .run_due_detached(Utc::now())
        .await;
    timer.finish_with_result(result.as_ref());
    Ok(Json(result?))
}
