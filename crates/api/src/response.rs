//! API response bodies and error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use session_engine::TerminationOutcome;
use telemetry::HealthReport;

/// Body returned by every termination endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationResponse {
    /// The client should re-fetch `/sessions`.
    pub refresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_deleted: Option<u64>,
    pub kicked: usize,
    pub kick_failures: usize,
    /// Error codes only; details are logged server-side.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl From<TerminationOutcome> for TerminationResponse {
    fn from(outcome: TerminationOutcome) -> Self {
        Self {
            refresh: outcome.refresh,
            local_deleted: outcome.local_deleted,
            kicked: outcome.kicks.succeeded,
            kick_failures: outcome.kicks.failed,
            errors: outcome.errors,
        }
    }
}

/// Body returned by the capture endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub written: bool,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub store_connected: bool,
    pub doveadm_available: bool,
    #[serde(flatten)]
    pub report: HealthReport,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// API error with a coded body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_003", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_001", msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<sessions_core::Error> for ApiError {
    fn from(err: sessions_core::Error) -> Self {
        use sessions_core::Error;

        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &err {
            Error::Auth { code, message, .. } | Error::ValidationWithCode { code, message, .. } => {
                ApiError::with_code(status, *code, message)
            }
            _ => match err.error_code() {
                Some(code) => ApiError::with_code(status, code, err.to_string()),
                None => ApiError::internal(err.to_string()),
            },
        }
    }
}
