//! API Error Handling
//!
//! Structured error responses with proper HTTP status codes and request tracking.

use crate::errors::{EngineError, StateError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// VALIDATION_ERROR, NOT_FOUND, STATE_ERROR, INSUFFICIENT_FUNDS, POLICY_ERROR, INTERNAL_ERROR
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error types with request tracking
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InsufficientFunds { message: String, available: f64, required: f64 },
    Policy { message: String, current: usize, required: usize },
    InternalError(String),
}

impl ApiError {
    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    /// Map an engine failure to its HTTP shape
    pub fn from_engine(request_id: String, err: EngineError) -> Self {
        let kind = match err {
            EngineError::Validation(msg) => ApiErrorKind::BadRequest(msg),
            EngineError::State(StateError::RoundNotFound(id)) => ApiErrorKind::NotFound(format!("round {} not found", id)),
            EngineError::State(state) => ApiErrorKind::Conflict(state.to_string()),
            EngineError::Funds { available, required } => ApiErrorKind::InsufficientFunds {
                message: format!("insufficient funds: balance {}, required {}", available, required),
                available: available.to_decimal(),
                required: required.to_decimal(),
            },
            EngineError::Policy { current, required } => ApiErrorKind::Policy {
                message: format!("need {} moves, have {}", required, current),
                current,
                required,
            },
            // Storage details stay in the server log
            EngineError::Persistence(_) => {
                ApiErrorKind::InternalError("internal storage error; round state unknown".to_string())
            }
        };
        Self { kind, request_id }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::Conflict(msg) => write!(f, "[{}] Conflict: {}", self.request_id, msg),
            ApiErrorKind::InsufficientFunds { message, .. } => write!(f, "[{}] {}", self.request_id, message),
            ApiErrorKind::Policy { message, .. } => write!(f, "[{}] Policy: {}", self.request_id, message),
            ApiErrorKind::InternalError(msg) => write!(f, "[{}] Internal Error: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self.kind {
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "STATE_ERROR", msg, None),
            ApiErrorKind::InsufficientFunds {
                message,
                available,
                required,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_FUNDS",
                message,
                Some(json!({ "available": available, "required": required })),
            ),
            ApiErrorKind::Policy {
                message,
                current,
                required,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "POLICY_ERROR",
                message,
                Some(json!({ "current": current, "required": required })),
            ),
            ApiErrorKind::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}
