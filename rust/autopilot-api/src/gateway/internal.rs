//! Internal endpoints, authenticated with the cron secret.
//!
//! The run executor calls the content endpoints over loopback HTTP. The
//! grant endpoint lets billing jobs add credits to a tenant.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;

use crate::AppState;
use crate::domain::{CreditGrant, GrantOutcome, PublishOutcome, TransactionType};
use crate::error::{AppError, AppResult};
use crate::scheduler::{InternalGenerateRequest, InternalGenerateResponse, InternalPublishRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/internal/content/generate", post(generate))
        .route("/api/internal/content/publish", post(publish))
        .route("/api/internal/credits/grant", post(grant_credits))
}

/// `POST /api/internal/content/generate`
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<InternalGenerateRequest>,
) -> AppResult<Json<InternalGenerateResponse>> {
    tracing::debug!(
        tenant_id = %req.tenant_id,
        article_id = %req.article_id,
        schedule_id = ?req.schedule_id,
        "Internal generate"
    );
    let content = state
        .content
        .generate(&req.tenant_id, &req.article_id, &req.project_id)
        .await?;
    Ok(Json(InternalGenerateResponse {
        content_id: content.id,
    }))
}

/// `POST /api/internal/content/publish`
pub async fn publish(
    State(state): State<AppState>,
    Json(req): Json<InternalPublishRequest>,
) -> AppResult<Json<PublishOutcome>> {
    let outcome = state
        .content
        .publish(&req.tenant_id, &req.content_id, &req.project_id, &req.platforms)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantCreditsRequest {
    pub tenant_id: String,
    /// Omit to change only the unlimited flag.
    pub amount: Option<i64>,
    #[serde(rename = "type", default = "default_grant_type")]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub description: String,
    /// Sets the tenant's unlimited flag when present.
    pub unlimited: Option<bool>,
}

fn default_grant_type() -> TransactionType {
    TransactionType::Topup
}

/// `POST /api/internal/credits/grant`
///
/// The flag change and the credit are applied together or not at all.
pub async fn grant_credits(
    State(state): State<AppState>,
    Json(req): Json<GrantCreditsRequest>,
) -> AppResult<Json<GrantOutcome>> {
    if req.tenant_id.trim().is_empty() {
        return Err(AppError::Validation("tenantId is required".to_string()));
    }
    let description = if req.description.is_empty() {
        format!("{} grant", req.transaction_type)
    } else {
        req.description
    };
    let grant = CreditGrant {
        amount: req.amount,
        transaction_type: req.transaction_type,
        description,
        unlimited: req.unlimited,
    };
    let outcome = state.ledger.grant(&req.tenant_id, &grant).await?;
    Ok(Json(outcome))
}
