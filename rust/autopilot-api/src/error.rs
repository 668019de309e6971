//! Error types shared by handlers, services and outbound clients.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::domain::{InvalidTransition, LedgerError, ScheduleValidationError};
use crate::llm::ParseError;

/// Failure talking to an external HTTP service.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },
    #[error("{service} request timed out")]
    Timeout { service: &'static str },
    #[error("{service} returned an unreadable response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },
}

impl UpstreamError {
    /// Transport errors, timeouts, 429 and 5xx are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Decode { .. } | Self::NotConfigured { .. } => false,
        }
    }

    /// Classify a `reqwest` failure.
    pub fn from_reqwest(service: &'static str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { service }
        } else if err.is_decode() {
            Self::Decode {
                service,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Http {
                service,
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            Self::Transport {
                service,
                message: err.to_string(),
            }
        }
    }

    /// Read a non-success response into an [`UpstreamError::Http`].
    pub async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > 512 {
            let mut cut = 512;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Self::Http {
            service,
            status,
            body,
        }
    }
}

/// Error returned by every HTTP handler.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: i64, available: i64 },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition(_) => StatusCode::CONFLICT,
            Self::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Parse(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition(_) => "invalid_state_transition",
            Self::InsufficientCredits { .. } => "insufficient_credits",
            Self::Upstream(_) => "upstream_error",
            Self::Parse(_) => "generation_parse_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<anyhow::Error> for AppError {
    /// Ledger rule violations travel through the repository as `anyhow`
    /// errors; recover them so they map to the right status.
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<LedgerError>() {
            Ok(ledger) => ledger.into(),
            Err(err) => Self::Internal(err),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits {
                required,
                available,
            } => Self::InsufficientCredits {
                required,
                available,
            },
            LedgerError::NonPositiveAmount(_) | LedgerError::Overflow { .. } => {
                Self::Validation(err.to_string())
            }
        }
    }
}

impl From<ScheduleValidationError> for AppError {
    fn from(err: ScheduleValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<i64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs.
        let message = match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Request failed");
                "Internal server error".to_string()
            }
            Self::Parse(e) => {
                tracing::error!(error = %e, "Generated content could not be parsed");
                "Generated content could not be parsed".to_string()
            }
            Self::Upstream(e) => {
                tracing::warn!(error = %e, "Upstream request failed");
                e.to_string()
            }
            other => other.to_string(),
        };

        let (required, available) = match &self {
            Self::InsufficientCredits {
                required,
                available,
            } => (Some(*required), Some(*available)),
            _ => (None, None),
        };

        let body = ErrorBody {
            error: self.code(),
            message,
            required,
            available,
        };
        (status, Json(body)).into_response()
    }
}

/// Result alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
