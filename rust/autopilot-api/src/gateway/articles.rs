//! Article (work item) endpoints.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;

use super::auth::AuthenticatedUser;
use crate::AppState;
use crate::domain::{Article, ArticleStatus};
use crate::error::{AppError, AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/projects/{id}/articles",
            get(list_articles).post(create_article),
        )
        .route(
            "/api/v1/articles/{id}",
            get(get_article).delete(delete_article),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    pub title: String,
    #[serde(default)]
    pub focus_keyword: String,
    pub outline: Option<String>,
    pub notes: Option<String>,
}

/// `POST /api/v1/projects/{id}/articles`
pub async fn create_article(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(project_id): Path<String>,
    Json(req): Json<CreateArticleRequest>,
) -> AppResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("Article title must not be empty".to_string()));
    }
    let project = state
        .projects
        .get_project(&user.tenant_id, &project_id)
        .await?
        .ok_or(AppError::NotFound("Project"))?;

    let mut article = Article::new(
        &user.tenant_id,
        &project.id,
        req.title.trim(),
        req.focus_keyword.trim(),
    );
    article.outline = req.outline;
    article.notes = req.notes;

    state.articles.create_article(&article).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// `GET /api/v1/projects/{id}/articles`
pub async fn list_articles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(project_id): Path<String>,
) -> AppResult<Json<Vec<Article>>> {
    state
        .projects
        .get_project(&user.tenant_id, &project_id)
        .await?
        .ok_or(AppError::NotFound("Project"))?;
    let articles = state.articles.list_articles(&user.tenant_id, &project_id).await?;
    Ok(Json(articles))
}

/// `GET /api/v1/articles/{id}`
pub async fn get_article(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Article>> {
    let article = state
        .articles
        .get_article(&user.tenant_id, &id)
        .await?
        .ok_or(AppError::NotFound("Article"))?;
    Ok(Json(article))
}

/// `DELETE /api/v1/articles/{id}`
///
/// Articles being written cannot be deleted, unless the writer has held
/// them for longer than the run lease.
pub async fn delete_article(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let article = state
        .articles
        .get_article(&user.tenant_id, &id)
        .await?
        .ok_or(AppError::NotFound("Article"))?;
    if article.status == ArticleStatus::Writing
        && !article.is_stale_writing(Utc::now(), state.config.scheduler.lease())
    {
        return Err(AppError::Validation(
            "Article is being written and cannot be deleted".to_string(),
        ));
    }
    state.articles.delete_article(&user.tenant_id, &id).await?;

    if let Some(schedule_id) = &article.schedule_id {
        if let Some(mut schedule) = state.schedules.get_schedule(&user.tenant_id, schedule_id).await? {
            let remaining = schedule
                .article_ids
                .iter()
                .filter(|a| **a != article.id)
                .cloned()
                .collect();
            schedule.set_article_ids(remaining);
            schedule.updated_at = Utc::now();
            state.schedules.update_schedule(&schedule).await?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}
