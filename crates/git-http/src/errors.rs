//! Error kinds the core distinguishes (spec §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Typed error kinds distinguished by the core. How each kind is translated
/// to a wire-visible shape is the caller's job (report-status line, ERR
/// packet, or HTTP status) since the same kind surfaces differently across
/// the three wire endpoints.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("unpack failed: {0}")]
    Unpack(String),
    #[error("ref rejected: {0}")]
    RefRejected(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

impl GitError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        GitError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for GitError {
    fn from(err: anyhow::Error) -> Self {
        GitError::Internal(err.to_string())
    }
}

/// HTTP-facing error used by the router/auth gate (spec §4.6) for requests
/// that fail before dispatch into the protocol engine.
pub enum GitHttpError {
    NotFound,
    Forbidden,
    BadRequest(String),
    Internal(String),
}

impl From<GitError> for GitHttpError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotFound(msg) => GitHttpError::BadRequest(msg),
            GitError::Unauthorized => GitHttpError::Forbidden,
            GitError::Protocol(msg) => GitHttpError::BadRequest(msg),
            GitError::Unpack(msg) => GitHttpError::BadRequest(msg),
            GitError::RefRejected(msg) => GitHttpError::BadRequest(msg),
            GitError::Internal(msg) => GitHttpError::Internal(msg),
        }
    }
}

impl IntoResponse for GitHttpError {
    fn into_response(self) -> Response {
        match self {
            GitHttpError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            GitHttpError::Forbidden => (StatusCode::FORBIDDEN, "forbidden").into_response(),
            GitHttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            GitHttpError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}
