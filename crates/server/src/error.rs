// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the control plane, mapped to HTTP exactly once, at
//! the handler boundary.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Closed error taxonomy. Internal layers pass `AppError` around with
/// wrap-context via `#[from]`/`.map_err`; handlers translate to HTTP only
/// at the return boundary, never more than once.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication failed")]
    Authn,

    #[error("access denied: {0}")]
    Authz(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backpressure: {0}")]
    Backpressure(String),

    #[error("dependency unavailable after retries: {0}")]
    TransientDependency(String),

    #[error("dependency failed: {0}")]
    PermanentDependency(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Authn => "AUTHN_ERROR",
            Self::Authz(_) => "AUTHZ_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Backpressure(_) => "BACKPRESSURE",
            Self::TransientDependency(_) => "TRANSIENT_DEPENDENCY_ERROR",
            Self::PermanentDependency(_) => "PERMANENT_DEPENDENCY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authn => StatusCode::UNAUTHORIZED,
            Self::Authz(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Backpressure(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::TransientDependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PermanentDependency(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `Retry-After` seconds for backpressure responses.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Backpressure(_) => Some(1),
            _ => None,
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.code().to_owned(), message: message.into() }
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // No information disclosure between "not found" and "wrong secret":
        // both surface the same message.
        let message = match &self {
            Self::Authn => "invalid credentials".to_owned(),
            other => other.to_string(),
        };
        let status = self.http_status();
        let body = ErrorResponse { error: self.to_error_body(message) };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs() {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert("retry-after", value);
            }
        }
        response
    }
}

pub type AppResult<T> = Result<T, AppError>;
