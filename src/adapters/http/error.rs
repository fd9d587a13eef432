//! DomainError -> HTTP response. Body is always `{error, code}`.

use crate::domain::DomainError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            DomainError::Storage(_) | DomainError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match &self.0 {
            DomainError::NotConnected => "NOT_CONNECTED",
            DomainError::ConfigurationMissing(_) => "NOT_CONFIGURED",
            DomainError::VerificationRequired => "VERIFICATION_REQUIRED",
            DomainError::Verification(_) => "VERIFICATION_ERROR",
            DomainError::RateLimited { .. } => "RATE_LIMITED",
            DomainError::Upstream(_) => "TELEGRAM_ERROR",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::AlreadyPending(_) => "ALREADY_PENDING",
            DomainError::Storage(_) => "STORAGE_ERROR",
            DomainError::Export(_) => "EXPORT_ERROR",
            DomainError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            DomainError::RateLimited { retry_after_secs } => json!({
                "error": self.0.to_string(),
                "code": self.code(),
                "retry_after": retry_after_secs,
            }),
            other => json!({ "error": other.to_string(), "code": self.code() }),
        };
        (status, Json(body)).into_response()
    }
}
