//! File management library for the arqiv document store.
//!
//! This crate provides handlers and routes for the document tree: uploads,
//! downloads, directory management, search and preview generation. Routes are
//! split into a read set and an admin set so the embedding service can attach
//! different access requirements to each.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub use config::FilesConfig;
pub use error::FilesError;

/// Per-request view restriction, inserted into request extensions by the
/// embedding service after authentication.
///
/// When absent the handlers behave as if the caller may see everything, so
/// the crate stays usable without an authentication layer in front of it.
#[derive(Debug, Clone, Default)]
pub struct ViewerScope {
    /// Caller may see the whole tree.
    pub full_access: bool,
    /// Top-level directory names the caller has been granted.
    pub resources: Vec<String>,
}

impl ViewerScope {
    /// Whether a top-level entry name is visible under this scope.
    pub fn allows(&self, name: &str) -> bool {
        self.full_access || self.resources.iter().any(|r| r == name)
    }
}

/// Extract the scope from request extensions, falling back to full access
/// when no restriction was attached.
impl<S> FromRequestParts<S> for ViewerScope
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ViewerScope>()
            .cloned()
            .unwrap_or(ViewerScope {
                full_access: true,
                resources: Vec::new(),
            }))
    }
}

/// Shared state for the file handlers.
#[derive(Clone)]
pub struct FilesState {
    /// Root of the served document tree.
    pub remote_dir: PathBuf,
    /// Deleted files are moved here with a timestamp prefix.
    pub backup_dir: PathBuf,
    /// Generated previews are cached here.
    pub preview_dir: PathBuf,
    /// Configuration.
    pub config: Arc<FilesConfig>,
}

impl FilesState {
    /// Create state rooted at `data_dir` with the conventional subdirectory
    /// layout (`remote/`, `backup/`, `preview/`) and default config.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self::with_config(data_dir, FilesConfig::default())
    }

    /// Create state rooted at `data_dir` with the given config.
    pub fn with_config(data_dir: impl AsRef<Path>, config: FilesConfig) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            remote_dir: data_dir.join("remote"),
            backup_dir: data_dir.join("backup"),
            preview_dir: data_dir.join("preview"),
            config: Arc::new(config),
        }
    }

    /// Create the storage directories if they do not exist yet.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.remote_dir)?;
        std::fs::create_dir_all(&self.backup_dir)?;
        std::fs::create_dir_all(&self.preview_dir)?;
        Ok(())
    }
}
