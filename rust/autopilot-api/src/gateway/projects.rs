//! Project endpoints.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::AuthenticatedUser;
use crate::AppState;
use crate::domain::{Project, WordPressCredentials};
use crate::error::{AppError, AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/projects", get(list_projects).post(create_project))
        .route(
            "/api/v1/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub language: Option<String>,
    pub wordpress: Option<WordPressCredentials>,
    pub social_profile_key: Option<String>,
}

/// Absent fields are left unchanged; `wordpress: null` removes the site.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub language: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub wordpress: Option<Option<WordPressCredentials>>,
    #[serde(default, deserialize_with = "double_option")]
    pub social_profile_key: Option<Option<String>>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// WordPress site without its application password.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPressSite {
    pub base_url: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub language: String,
    pub wordpress: Option<WordPressSite>,
    pub has_social_profile: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        let has_social_profile = project.has_social();
        Self {
            id: project.id,
            name: project.name,
            language: project.language,
            wordpress: project.wordpress.map(|wp| WordPressSite {
                base_url: wp.base_url,
                username: wp.username,
            }),
            has_social_profile,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

fn validate_wordpress(wordpress: &WordPressCredentials) -> AppResult<()> {
    let parsed = url::Url::parse(&wordpress.base_url)
        .map_err(|e| AppError::Validation(format!("Invalid WordPress base URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(
            "WordPress base URL must be http or https".to_string(),
        ));
    }
    if wordpress.username.trim().is_empty() || wordpress.app_password.trim().is_empty() {
        return Err(AppError::Validation(
            "WordPress username and application password are required".to_string(),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Project name must not be empty".to_string()));
    }
    Ok(())
}

/// `POST /api/v1/projects`
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<CreateProjectRequest>,
) -> AppResult<impl IntoResponse> {
    validate_name(&req.name)?;
    if let Some(wordpress) = &req.wordpress {
        validate_wordpress(wordpress)?;
    }

    let mut project = Project::new(&user.tenant_id, req.name.trim());
    if let Some(language) = req.language {
        project.language = language;
    }
    project.wordpress = req.wordpress;
    project.social_profile_key = req.social_profile_key;

    state.projects.create_project(&project).await?;
    tracing::info!(tenant_id = %user.tenant_id, project_id = %project.id, "Project created");
    Ok((StatusCode::CREATED, Json(ProjectResponse::from(project))))
}

/// `GET /api/v1/projects`
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Vec<ProjectResponse>>> {
    let projects = state.projects.list_projects(&user.tenant_id).await?;
    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

/// `GET /api/v1/projects/{id}`
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ProjectResponse>> {
    let project = state
        .projects
        .get_project(&user.tenant_id, &id)
        .await?
        .ok_or(AppError::NotFound("Project"))?;
    Ok(Json(project.into()))
}

/// `PATCH /api/v1/projects/{id}`
pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> AppResult<Json<ProjectResponse>> {
    let mut project = state
        .projects
        .get_project(&user.tenant_id, &id)
        .await?
        .ok_or(AppError::NotFound("Project"))?;

    if let Some(name) = req.name {
        validate_name(&name)?;
        project.name = name.trim().to_string();
    }
    if let Some(language) = req.language {
        project.language = language;
    }
    if let Some(wordpress) = req.wordpress {
        if let Some(wp) = &wordpress {
            validate_wordpress(wp)?;
        }
        project.wordpress = wordpress;
    }
    if let Some(key) = req.social_profile_key {
        project.social_profile_key = key;
    }
    project.updated_at = Utc::now();

    state.projects.update_project(&project).await?;
    Ok(Json(project.into()))
}

/// `DELETE /api/v1/projects/{id}`
///
/// Also removes the project's articles, content and schedules.
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !state.projects.delete_project(&user.tenant_id, &id).await? {
        return Err(AppError::NotFound("Project"));
    }
    tracing::info!(tenant_id = %user.tenant_id, project_id = %id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}
