use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilesError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Path is outside the document root")]
    PathTraversal,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("File type not allowed: {0}")]
    TypeNotAllowed(String),

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Directory operation not allowed on file")]
    NotADirectory,

    #[error("File operation not allowed on directory")]
    NotAFile,

    #[error("Preview not available: {0}")]
    PreviewUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for FilesError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            FilesError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            FilesError::PathTraversal => (StatusCode::FORBIDDEN, "PATH_TRAVERSAL"),
            FilesError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "INVALID_PATH"),
            FilesError::TypeNotAllowed(_) => (StatusCode::BAD_REQUEST, "TYPE_NOT_ALLOWED"),
            FilesError::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
            FilesError::NotADirectory => (StatusCode::BAD_REQUEST, "NOT_A_DIRECTORY"),
            FilesError::NotAFile => (StatusCode::BAD_REQUEST, "NOT_A_FILE"),
            FilesError::PreviewUnavailable(_) => (StatusCode::BAD_REQUEST, "PREVIEW_UNAVAILABLE"),
            FilesError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}
