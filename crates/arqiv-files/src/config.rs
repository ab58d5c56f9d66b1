use serde::{Deserialize, Serialize};

/// File handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Maximum upload size per file (in bytes).
    pub max_upload_size: u64,

    /// Maximum depth for directory walks (search, recent files).
    pub max_depth: usize,

    /// Extensions accepted for upload (with leading dot, case-insensitive).
    pub allowed_extensions: Vec<String>,

    /// Directory names skipped during walks.
    pub hidden_dirs: Vec<String>,

    /// Bounding box for generated image thumbnails (width, height).
    pub thumbnail_size: (u32, u32),
}

fn default_allowed_extensions() -> Vec<String> {
    [
        // Documents
        ".pdf", ".doc", ".docx", ".odt", ".rtf", ".txt", ".md",
        // Spreadsheets
        ".csv", ".xls", ".xlsx", ".ods",
        // Presentations
        ".ppt", ".pptx", ".odp",
        // Images
        ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_hidden_dirs() -> Vec<String> {
    vec![".git".to_string(), ".cache".to_string(), ".tmp".to_string()]
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 100 * 1024 * 1024, // 100 MB
            max_depth: 20,
            allowed_extensions: default_allowed_extensions(),
            hidden_dirs: default_hidden_dirs(),
            thumbnail_size: (800, 600),
        }
    }
}

impl FilesConfig {
    /// Check whether a filename carries an accepted extension.
    pub fn is_allowed_file(&self, filename: &str) -> bool {
        let Some(ext) = filename.rsplit_once('.').map(|(_, e)| e) else {
            return false;
        };
        let dotted = format!(".{}", ext);
        self.allowed_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&dotted))
    }

    /// Check whether a directory name is skipped during walks.
    pub fn is_hidden_dir(&self, name: &str) -> bool {
        self.hidden_dirs.iter().any(|d| d == name)
    }
}
