//! API error types and responses.
//!
//! Every failure is answered with `{ "error": { "code", "message" } }`;
//! validation failures add a `fields` map of per-field messages.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use admiral_control::{ControlError, ValidationErrors};

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("{0}")]
    NotFound(String),

    /// Input failed validation.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// The request conflicts with the current state.
    #[error("{0}")]
    Conflict(String),

    /// Malformed request path or body.
    #[error("{0}")]
    BadRequest(String),

    /// The config store or scheduler failed.
    #[error("{0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    error: ErrorBody<'a>,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a BTreeMap<String, Vec<String>>>,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_failed",
            Self::Conflict(_) => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
                fields: match &self {
                    Self::Validation(errors) => Some(errors.fields()),
                    _ => None,
                },
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::NotFound { kind, id } => {
                Self::NotFound(format!("The {kind} {id} was not found."))
            }
            ControlError::Validation(errors) => Self::Validation(errors),
            ControlError::Conflict(message) => Self::Conflict(message),
            ControlError::Store(e) => {
                tracing::error!(error = %e, "Config store error");
                Self::Internal("There was a problem talking to the config store.".to_string())
            }
            ControlError::Scheduler(e) => {
                tracing::error!(error = %e, retriable = e.is_retriable(), "Scheduler error");
                Self::Internal("There was a problem talking to the cluster scheduler.".to_string())
            }
        }
    }
}
