//! Application state shared across handlers.

use arqiv_files::FilesState;

use crate::auth::AuthState;

#[derive(Clone)]
pub struct AppState {
    /// Identity provider gateway state.
    pub auth: AuthState,
    /// Document store state.
    pub files: FilesState,
}

impl AppState {
    pub fn new(auth: AuthState, files: FilesState) -> Self {
        Self { auth, files }
    }
}
