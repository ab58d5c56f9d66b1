use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::FilesState;
use crate::handlers;

/// Routes any authenticated caller may use.
pub fn read_routes() -> Router<FilesState> {
    Router::new()
        // Directory tree
        .route("/contents", get(handlers::contents))
        .route("/search", get(handlers::search))
        .route("/recent", get(handlers::recent))
        // Document retrieval
        .route("/download", get(handlers::download))
        // Previews and document info
        .route("/preview", get(handlers::preview))
        .route("/pdf/info", get(handlers::pdf_info))
        .route("/pdf/raw", get(handlers::pdf_raw))
        .route("/office/info", get(handlers::office_info))
}

/// Routes that mutate the tree. The embedding service is expected to attach
/// an access requirement to these.
pub fn admin_routes() -> Router<FilesState> {
    Router::new()
        .route("/upload", post(handlers::upload))
        .route("/file", delete(handlers::delete_file))
        .route("/mkdir", put(handlers::create_dir))
        .route("/rename", post(handlers::rename))
}
