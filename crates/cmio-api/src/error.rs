// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API error type with HTTP status mapping.
//!
//! Every error renders as `{"error": "<message>"}` with the matching status
//! code, the shape the operator UI expects.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use cmio_core::CoreError;

/// Result type alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the REST front-end.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 404 - the referenced resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// 400 - the request is malformed or fails validation.
    #[error("{0}")]
    BadRequest(String),

    /// 503 - the endpoint is disabled while the TCP peer is attached.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// 500 - a bus or internal failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Creates a 404 error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a 400 error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Creates the 503 returned while the automation peer holds control.
    pub fn controls_disabled() -> Self {
        Self::ServiceUnavailable(
            "TCP client is connected, frontend controls are disabled".to_string(),
        )
    }

    /// Creates a 500 error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match &error {
            CoreError::CardNotFound { .. } => Self::NotFound(error.to_string()),
            CoreError::IndexOutOfRange { .. }
            | CoreError::UnknownModule { .. }
            | CoreError::DetectionFailed { .. }
            | CoreError::InvalidSlaveId { .. } => Self::BadRequest(error.to_string()),
            CoreError::Port { .. } | CoreError::Modbus(_) => Self::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(
            ApiError::from(CoreError::card_not_found("9")),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(CoreError::IndexOutOfRange { index: 9, limit: 4 }),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn test_controls_disabled_message() {
        let error = ApiError::controls_disabled();
        assert_eq!(
            error.to_string(),
            "TCP client is connected, frontend controls are disabled"
        );
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
