//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Configuration failures. All of these are detected before any backend
/// connection is attempted, except `IdentityMismatch` which is raised by
/// post-connect verification and is equally fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate backend name: {0}")]
    DuplicateName(String),
    #[error("backend name '{0}' collides with a reserved root path")]
    ReservedPath(String),
    #[error("invalid backend name: '{0}' (must start with a letter, then letters, digits or underscores)")]
    InvalidName(String),
    #[error("invalid endpoint segment: '{0}'")]
    InvalidEndpoint(String),
    #[error("mount collision: two backends resolve to {0}")]
    MountCollision(String),
    #[error("unknown role: {0} (expected user or full)")]
    UnknownRole(String),
    #[error("unknown access mode: {0} (expected restricted or unrestricted)")]
    UnknownAccessMode(String),
    #[error("unknown mount mode: {0} (expected composed or separate)")]
    UnknownMountMode(String),
    #[error("unknown transport: {0} (expected http or streamable-http)")]
    UnknownTransport(String),
    #[error("identity mismatch for backend {name}: expected database '{expected}', connected to '{actual}'")]
    IdentityMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("connect {name}: {message}")]
    Connect { name: String, message: String },
    #[error("connect {name}: timed out after {seconds}s")]
    Timeout { name: String, seconds: u64 },
    #[error("backend {name} is {state}, cannot open")]
    InvalidState { name: String, state: &'static str },
    #[error("startup cancelled by shutdown signal")]
    Cancelled,
    #[error("operation {0}: {1}")]
    Operation(String, String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GatewayError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            GatewayError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            GatewayError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            GatewayError::Operation(_, _) => (StatusCode::INTERNAL_SERVER_ERROR, "operation_error"),
            GatewayError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            GatewayError::Connect { .. } | GatewayError::Timeout { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
