//! Credit balance endpoints.

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use super::auth::AuthenticatedUser;
use crate::AppState;
use crate::domain::{CreditBalance, CreditTransaction};
use crate::error::AppResult;

const MAX_PAGE_SIZE: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/credits", get(get_balance))
        .route("/api/v1/credits/transactions", get(list_transactions))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// `GET /api/v1/credits`
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<CreditBalance>> {
    Ok(Json(state.ledger.balance(&user.tenant_id).await?))
}

/// `GET /api/v1/credits/transactions?limit=&offset=`
///
/// Newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Vec<CreditTransaction>>> {
    let limit = page.limit.clamp(1, MAX_PAGE_SIZE);
    let transactions = state
        .ledger
        .transactions(&user.tenant_id, limit, page.offset)
        .await?;
    Ok(Json(transactions))
}
