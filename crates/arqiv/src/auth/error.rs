//! Authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication and authorization failures.
///
/// Everything except `InsufficientPermissions` rejects the request with 401,
/// including the `Other` catch-all: an unrecognized failure must never let a
/// request through.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing authorization header.
    #[error("missing authorization header")]
    MissingAuthHeader,

    /// Authorization header is not of the form `Bearer <token>`.
    #[error("invalid authorization header format")]
    InvalidAuthHeader,

    /// Token is malformed or its signature does not verify.
    #[error("invalid token: {0}")]
    InvalidSignature(String),

    /// Provider reports the token as not active.
    #[error("token is not active")]
    TokenInactive,

    /// Token expiry lies in the past.
    #[error("token expired")]
    TokenExpired,

    /// The identity provider could not be reached.
    #[error("identity provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// Authenticated, but the required role or permission is missing.
    #[error("{0}")]
    InsufficientPermissions(String),

    /// Anything else, rejected rather than interpreted.
    #[error("authentication failed: {0}")]
    Other(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            AuthError::MissingAuthHeader => (StatusCode::UNAUTHORIZED, "missing_auth_header"),
            AuthError::InvalidAuthHeader => (StatusCode::UNAUTHORIZED, "invalid_auth_header"),
            AuthError::InvalidSignature(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::TokenInactive => (StatusCode::UNAUTHORIZED, "token_inactive"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired"),
            AuthError::ProviderUnreachable(_) => (StatusCode::UNAUTHORIZED, "provider_unreachable"),
            AuthError::InsufficientPermissions(_) => {
                (StatusCode::FORBIDDEN, "insufficient_permissions")
            }
            AuthError::Other(_) => (StatusCode::UNAUTHORIZED, "authentication_failed"),
        };

        let body = Json(AuthErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}
