//! API error types with HTTP status mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Error;

/// API error type with HTTP status code mapping.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found (404).
    NotFound(String),
    /// Bad request - invalid input (400).
    BadRequest(String),
    /// Domain-level failure with a stable identifier (500).
    Server {
        /// Stable error identifier.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },
    /// Internal server error (500).
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// What went wrong.
    pub error: String,
    /// Stable error identifier (e.g. "NOT_FOUND", "ACTION_ERROR").
    pub code: String,
}

impl ApiError {
    fn server(code: &'static str, err: &Error) -> Self {
        ApiError::Server {
            code,
            message: err.to_string(),
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Server { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            ApiError::NotFound(msg) => ("NOT_FOUND", msg),
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg),
            ApiError::Server { code, message } => (code, message),
            ApiError::Internal(msg) => ("INTERNAL_ERROR", msg),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match &err {
            Error::DomainNotFound { .. } => ApiError::NotFound(err.to_string()),
            Error::Connection { .. } => ApiError::server("CONNECTION_ERROR", &err),
            Error::Hypervisor { .. } => ApiError::server("HYPERVISOR_ERROR", &err),
            Error::Descriptor { .. } => ApiError::server("DESCRIPTOR_ERROR", &err),
            Error::StateMapping { .. } => ApiError::server("STATE_MAPPING_ERROR", &err),
            Error::Action { .. } => ApiError::server("ACTION_ERROR", &err),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainAction;
    use crate::hypervisor::{ErrorKind, HypervisorError};

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::Server {
                    code: "ACTION_ERROR",
                    message: "x".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_domain_errors_map_to_stable_codes() {
        let hv_err = || HypervisorError::new(ErrorKind::Internal, "boom");
        let cases = [
            (
                Error::DomainNotFound { name: "x".into() },
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                Error::Connection {
                    uri: "qemu:///system".into(),
                    source: hv_err(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONNECTION_ERROR",
            ),
            (
                Error::hypervisor("list domains", hv_err()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "HYPERVISOR_ERROR",
            ),
            (
                Error::descriptor("x", "bad markup"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "DESCRIPTOR_ERROR",
            ),
            (
                Error::StateMapping {
                    domain: "x".into(),
                    code: 9,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "STATE_MAPPING_ERROR",
            ),
            (
                Error::Action {
                    action: DomainAction::Reboot,
                    domain: "x".into(),
                    message: "no".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "ACTION_ERROR",
            ),
            (
                Error::HandleReleased,
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status(), status);
            let expected = match &api {
                ApiError::NotFound(_) => "NOT_FOUND",
                ApiError::BadRequest(_) => "BAD_REQUEST",
                ApiError::Server { code, .. } => *code,
                ApiError::Internal(_) => "INTERNAL_ERROR",
            };
            assert_eq!(expected, code);
        }
    }

    #[test]
    fn test_not_found_never_comes_from_message_text() {
        // Only the structured variant maps to 404.
        let err = Error::hypervisor(
            "look up domain",
            HypervisorError::new(ErrorKind::Internal, "Domain not found"),
        );
        assert_eq!(ApiError::from(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
