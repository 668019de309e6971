//! Authentication middleware.
//!
//! Tenant routes under `/api/v1` take an HS256 JWT; the cron trigger and the
//! internal loopback routes take the shared cron secret. Everything else is
//! public.

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Authentication error response.
#[derive(Debug, Serialize)]
pub struct AuthError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub message: String,
}

impl AuthError {
    fn unauthorized(error: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: error.to_string(),
            message: message.into(),
        }
    }

    fn forbidden(error: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            error: error.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Tenant the user acts for. Falls back to `sub` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Authenticated tenant user, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        let tenant_id = claims
            .tenant_id
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| claims.sub.clone());
        Self {
            user_id: claims.sub,
            tenant_id,
            roles: claims.roles,
        }
    }
}

/// Generate a JWT token.
pub fn generate_jwt(
    user_id: &str,
    tenant_id: Option<&str>,
    roles: Vec<String>,
    secret: &str,
    expiry_secs: u64,
) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + i64::try_from(expiry_secs).unwrap_or(i64::MAX / 2),
        iat: now,
        tenant_id: tenant_id.map(String::from),
        roles,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a JWT token.
pub fn validate_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Which credential a path requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    Public,
    CronSecret,
    TenantJwt,
}

fn guard_for(path: &str) -> Guard {
    if path.starts_with("/api/cron/") || path.starts_with("/api/internal/") {
        Guard::CronSecret
    } else if path.starts_with("/api/v1/") {
        Guard::TenantJwt
    } else {
        Guard::Public
    }
}

fn bearer_token(req: &Request<Body>) -> Option<String> {
    req.headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Authentication middleware covering every route.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    match guard_for(req.uri().path()) {
        Guard::Public => {}
        Guard::CronSecret => {
            check_cron_secret(state.config.gateway.cron_secret.as_deref(), bearer_token(&req))?;
        }
        Guard::TenantJwt => {
            let secret = state.config.gateway.jwt_secret.as_deref().ok_or_else(|| {
                AuthError::unauthorized("configuration_error", "JWT secret not configured")
            })?;
            let token = bearer_token(&req).ok_or_else(|| {
                AuthError::unauthorized("missing_auth", "Authorization header is required")
            })?;
            let claims = validate_jwt(&token, secret).map_err(|e| {
                AuthError::unauthorized("invalid_token", format!("JWT validation failed: {e}"))
            })?;
            req.extensions_mut().insert(AuthenticatedUser::from(claims));
        }
    }

    Ok(next.run(req).await)
}

/// 403 when no secret is configured, 401 when the bearer is absent or wrong.
fn check_cron_secret(configured: Option<&str>, presented: Option<String>) -> Result<(), AuthError> {
    let Some(expected) = configured.filter(|s| !s.is_empty()) else {
        tracing::warn!("Cron request rejected: no cron secret configured");
        return Err(AuthError::forbidden(
            "cron_disabled",
            "Cron endpoints are disabled: no cron secret configured",
        ));
    };
    match presented {
        Some(token) if secrets_match(expected.as_bytes(), token.as_bytes()) => Ok(()),
        Some(_) => Err(AuthError::unauthorized("invalid_token", "Invalid cron secret")),
        None => Err(AuthError::unauthorized(
            "missing_auth",
            "Authorization header is required",
        )),
    }
}

/// Comparison time depends only on the lengths.
fn secrets_match(expected: &[u8], presented: &[u8]) -> bool {
    expected.len() == presented.len()
        && expected
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-at-least-32-chars";

    #[test]
    fn test_jwt_round_trip_with_tenant() {
        let token = generate_jwt("user-1", Some("tenant-9"), vec!["admin".into()], SECRET, 60).unwrap();
        let user = AuthenticatedUser::from(validate_jwt(&token, SECRET).unwrap());
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.tenant_id, "tenant-9");
        assert_eq!(user.roles, vec!["admin".to_string()]);
    }

    #[test]
    fn test_tenant_falls_back_to_subject() {
        let token = generate_jwt("user-1", None, vec![], SECRET, 60).unwrap();
        let user = AuthenticatedUser::from(validate_jwt(&token, SECRET).unwrap());
        assert_eq!(user.tenant_id, "user-1");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = generate_jwt("user-1", None, vec![], SECRET, 60).unwrap();
        assert!(validate_jwt(&token, "another-secret-another-secret-xx").is_err());
    }

    #[test]
    fn test_guards() {
        assert_eq!(guard_for("/health"), Guard::Public);
        assert_eq!(guard_for("/api/cron/autopilot"), Guard::CronSecret);
        assert_eq!(guard_for("/api/internal/content/generate"), Guard::CronSecret);
        assert_eq!(guard_for("/api/v1/schedules"), Guard::TenantJwt);
    }

    #[test]
    fn test_cron_secret_statuses() {
        let err = check_cron_secret(None, Some("x".into())).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err = check_cron_secret(Some("s3cret"), None).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = check_cron_secret(Some("s3cret"), Some("s3creT".into())).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        assert!(check_cron_secret(Some("s3cret"), Some("s3cret".into())).is_ok());
    }
}
