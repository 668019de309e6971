//! Tenant content endpoints: generate, publish, fetch.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use super::auth::AuthenticatedUser;
use crate::AppState;
use crate::domain::{Content, PublishOutcome};
use crate::error::{AppError, AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/content/generate", post(generate_content))
        .route("/api/v1/content/publish", post(publish_content))
        .route("/api/v1/content/{id}", get(get_content))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub article_id: String,
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub content_id: String,
    pub project_id: String,
    #[serde(default)]
    pub platforms: Vec<String>,
}

/// `POST /api/v1/content/generate`
pub async fn generate_content(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<GenerateRequest>,
) -> AppResult<impl IntoResponse> {
    let content = state
        .content
        .generate(&user.tenant_id, &req.article_id, &req.project_id)
        .await?;
    Ok((StatusCode::CREATED, Json(content)))
}

/// `POST /api/v1/content/publish`
pub async fn publish_content(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<PublishRequest>,
) -> AppResult<Json<PublishOutcome>> {
    let outcome = state
        .content
        .publish(&user.tenant_id, &req.content_id, &req.project_id, &req.platforms)
        .await?;
    Ok(Json(outcome))
}

/// `GET /api/v1/content/{id}`
pub async fn get_content(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Content>> {
    let content = state
        .contents
        .get_content(&user.tenant_id, &id)
        .await?
        .ok_or(AppError::NotFound("Content"))?;
    Ok(Json(content))
}
