//! Autopilot schedule endpoints.
//!
//! CRUD for schedules plus a run-now trigger that goes through the same
//! executor path as the cron endpoint.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use super::auth::AuthenticatedUser;
use crate::AppState;
use crate::database::DueSchedule;
use crate::domain::{Article, ArticleStatus, Frequency, Schedule, TimeOfDay};
use crate::error::{AppError, AppResult};
use crate::scheduler::{ScheduleRunResult, compute_next_run};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/schedules", get(list_schedules).post(create_schedule))
        .route(
            "/api/v1/schedules/{id}",
            get(get_schedule).patch(update_schedule).delete(delete_schedule),
        )
        .route("/api/v1/schedules/{id}/run", post(run_schedule))
}

/// Request to create a new schedule.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub project_id: String,
    pub name: String,
    pub frequency: Frequency,
    pub time_of_day: TimeOfDay,
    pub second_time_of_day: Option<TimeOfDay>,
    pub day_of_week: Option<u8>,
    #[serde(default)]
    pub days_of_week: BTreeSet<u8>,
    pub day_of_month: Option<u8>,
    pub custom_interval: Option<u32>,
    #[serde(default)]
    pub article_ids: Vec<String>,
    pub articles_per_run: Option<u32>,
    #[serde(default)]
    pub auto_publish: bool,
    #[serde(default)]
    pub platforms: Vec<String>,
}

/// Request to update a schedule. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScheduleRequest {
    pub name: Option<String>,
    pub frequency: Option<Frequency>,
    pub time_of_day: Option<TimeOfDay>,
    pub second_time_of_day: Option<TimeOfDay>,
    pub day_of_week: Option<u8>,
    pub days_of_week: Option<BTreeSet<u8>>,
    pub day_of_month: Option<u8>,
    pub custom_interval: Option<u32>,
    pub article_ids: Option<Vec<String>>,
    pub articles_per_run: Option<u32>,
    pub auto_publish: Option<bool>,
    pub platforms: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl UpdateScheduleRequest {
    fn changes_timing(&self) -> bool {
        self.frequency.is_some()
            || self.time_of_day.is_some()
            || self.second_time_of_day.is_some()
            || self.day_of_week.is_some()
            || self.days_of_week.is_some()
            || self.day_of_month.is_some()
            || self.custom_interval.is_some()
    }
}

/// Load the articles named by `article_ids`, all of which must belong to `project_id`.
async fn load_articles(
    state: &AppState,
    tenant_id: &str,
    project_id: &str,
    article_ids: &[String],
) -> AppResult<Vec<Article>> {
    let mut articles = Vec::with_capacity(article_ids.len());
    for id in article_ids {
        let article = state
            .articles
            .get_article(tenant_id, id)
            .await?
            .filter(|a| a.project_id == project_id)
            .ok_or_else(|| {
                AppError::Validation(format!("Article '{id}' does not belong to this project"))
            })?;
        articles.push(article);
    }
    Ok(articles)
}

/// Point the articles at `schedule_id` and queue the planned ones.
async fn attach_articles(
    state: &AppState,
    schedule_id: &str,
    articles: Vec<Article>,
) -> AppResult<()> {
    for mut article in articles {
        article.schedule_id = Some(schedule_id.to_string());
        if article.status == ArticleStatus::Planned {
            article.transition(ArticleStatus::Queued)?;
        }
        article.updated_at = Utc::now();
        state.articles.update_article(&article).await?;
    }
    Ok(())
}

/// `POST /api/v1/schedules`
pub async fn create_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<CreateScheduleRequest>,
) -> AppResult<impl IntoResponse> {
    let project = state
        .projects
        .get_project(&user.tenant_id, &req.project_id)
        .await?
        .ok_or(AppError::NotFound("Project"))?;

    let mut schedule = Schedule::new(&user.tenant_id, &project.id, req.name.trim(), req.time_of_day);
    schedule.frequency = req.frequency;
    schedule.second_time_of_day = req.second_time_of_day;
    schedule.day_of_week = req.day_of_week;
    schedule.days_of_week = req.days_of_week;
    schedule.day_of_month = req.day_of_month;
    schedule.custom_interval = req.custom_interval;
    schedule.articles_per_run = req.articles_per_run.unwrap_or(1);
    schedule.auto_publish = req.auto_publish;
    schedule.platforms = req.platforms;
    schedule.set_article_ids(req.article_ids);
    schedule.validate()?;
    schedule.next_run_at = compute_next_run(&schedule, Utc::now());

    let articles =
        load_articles(&state, &user.tenant_id, &project.id, &schedule.article_ids).await?;

    state.schedules.create_schedule(&schedule).await?;
    attach_articles(&state, &schedule.id, articles).await?;

    tracing::info!(
        tenant_id = %user.tenant_id,
        schedule_id = %schedule.id,
        frequency = %schedule.frequency,
        next_run_at = %schedule.next_run_at,
        "Schedule created"
    );
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// `GET /api/v1/schedules`
pub async fn list_schedules(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(state.schedules.list_schedules(&user.tenant_id).await?))
}

/// `GET /api/v1/schedules/{id}`
pub async fn get_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Schedule>> {
    let schedule = state
        .schedules
        .get_schedule(&user.tenant_id, &id)
        .await?
        .ok_or(AppError::NotFound("Schedule"))?;
    Ok(Json(schedule))
}

/// `PATCH /api/v1/schedules/{id}`
pub async fn update_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateScheduleRequest>,
) -> AppResult<Json<Schedule>> {
    let mut schedule = state
        .schedules
        .get_schedule(&user.tenant_id, &id)
        .await?
        .ok_or(AppError::NotFound("Schedule"))?;

    let now = Utc::now();
    let reschedule = req.changes_timing() || (req.is_active == Some(true) && !schedule.is_active);

    if let Some(name) = &req.name {
        schedule.name = name.trim().to_string();
    }
    if let Some(frequency) = req.frequency {
        schedule.frequency = frequency;
    }
    if let Some(time) = req.time_of_day {
        schedule.time_of_day = time;
    }
    if req.second_time_of_day.is_some() {
        schedule.second_time_of_day = req.second_time_of_day;
    }
    if req.day_of_week.is_some() {
        schedule.day_of_week = req.day_of_week;
    }
    if let Some(days) = req.days_of_week {
        schedule.days_of_week = days;
    }
    if req.day_of_month.is_some() {
        schedule.day_of_month = req.day_of_month;
    }
    if req.custom_interval.is_some() {
        schedule.custom_interval = req.custom_interval;
    }
    if let Some(per_run) = req.articles_per_run {
        schedule.articles_per_run = per_run;
    }
    if let Some(auto_publish) = req.auto_publish {
        schedule.auto_publish = auto_publish;
    }
    if let Some(platforms) = req.platforms {
        schedule.platforms = platforms;
    }
    if let Some(active) = req.is_active {
        schedule.is_active = active;
    }
    let added = match req.article_ids {
        Some(ids) => {
            let added: Vec<String> = ids
                .iter()
                .filter(|id| !schedule.article_ids.contains(id))
                .cloned()
                .collect();
            schedule.set_article_ids(ids);
            added
        }
        None => Vec::new(),
    };

    schedule.validate()?;
    let added = load_articles(&state, &user.tenant_id, &schedule.project_id, &added).await?;
    if reschedule {
        schedule.next_run_at = compute_next_run(&schedule, now);
    }
    schedule.updated_at = now;

    state.schedules.update_schedule(&schedule).await?;
    attach_articles(&state, &schedule.id, added).await?;
    Ok(Json(schedule))
}

/// `DELETE /api/v1/schedules/{id}`
pub async fn delete_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !state.schedules.delete_schedule(&user.tenant_id, &id).await? {
        return Err(AppError::NotFound("Schedule"));
    }
    tracing::info!(tenant_id = %user.tenant_id, schedule_id = %id, "Schedule deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/schedules/{id}/run`
///
/// Runs the schedule's next batch now, regardless of `nextRunAt`.
pub async fn run_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ScheduleRunResult>> {
    let schedule = state
        .schedules
        .get_schedule(&user.tenant_id, &id)
        .await?
        .ok_or(AppError::NotFound("Schedule"))?;
    if !schedule.is_active {
        return Err(AppError::Validation("Schedule is not active".to_string()));
    }
    let project = state
        .projects
        .get_project(&user.tenant_id, &schedule.project_id)
        .await?
        .ok_or(AppError::NotFound("Project"))?;

    let result = Arc::clone(&state.executor)
        .run_schedule_detached(DueSchedule { schedule, project }, Utc::now())
        .await?;
    Ok(Json(result))
}
