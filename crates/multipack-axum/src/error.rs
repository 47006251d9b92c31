//! Axum-specific error types and mappings.
//!
//! Maps the domain error taxonomy from `multipack-core` onto HTTP status
//! codes and a JSON response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use multipack_core::{BackendError, ForwardError, SymbolicationError};
use serde::Serialize;
use thiserror::Error;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (no target, unknown target, malformed body).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The worker answered with something unusable or not at all.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// The worker did not answer within the forward timeout.
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    /// Service unavailable (worker failed to start, shutting down).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::BadGateway(msg)
            | Self::GatewayTimeout(msg)
            | Self::ServiceUnavailable(msg)
            | Self::Internal(msg) => msg,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.message(),
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<ForwardError> for HttpError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Timeout { .. } => Self::GatewayTimeout(err.to_string()),
            ForwardError::Unreachable { .. } => Self::BadGateway(err.to_string()),
            ForwardError::InvalidRequest(msg) => Self::BadRequest(msg),
        }
    }
}

impl From<BackendError> for HttpError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::UnknownTarget(name) => Self::BadRequest(format!("Unknown target: {name}")),
            BackendError::AssetNotFound { .. } => Self::NotFound(err.to_string()),
            BackendError::Spawn(e) => Self::ServiceUnavailable(e.to_string()),
            BackendError::Forward(e) => e.into(),
            BackendError::ShuttingDown => Self::ServiceUnavailable(err.to_string()),
            BackendError::Compiler(e) => Self::Internal(e.to_string()),
            BackendError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<SymbolicationError> for HttpError {
    fn from(err: SymbolicationError) -> Self {
        match err {
            SymbolicationError::UnknownTarget => Self::BadRequest(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multipack_core::{Target, WorkerSpawnError};

    fn ios() -> Target {
        Target::new("ios").unwrap()
    }

    #[test]
    fn test_forward_errors_are_server_errors() {
        let timeout: HttpError = BackendError::Forward(ForwardError::Timeout {
            target: ios(),
            timeout_secs: 300,
        })
        .into();
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let unreachable: HttpError = BackendError::Forward(ForwardError::Unreachable {
            target: ios(),
            reason: "connection refused".into(),
        })
        .into();
        assert_eq!(unreachable.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_spawn_failure_is_unavailable() {
        let err: HttpError = BackendError::Spawn(WorkerSpawnError::ExitedBeforeReady {
            target: ios(),
            status: "exit status: 1".into(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_client_errors() {
        let unknown: HttpError = BackendError::UnknownTarget("web".into()).into();
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        let missing: HttpError = BackendError::AssetNotFound {
            target: ios(),
            name: "x.js".into(),
        }
        .into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let symbolicate: HttpError = SymbolicationError::UnknownTarget.into();
        assert_eq!(symbolicate.status(), StatusCode::BAD_REQUEST);
    }
}
