use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::FilesError;
use crate::{FilesState, ViewerScope};

static XLSX_SHEET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<sheet[^>]*\bname="([^"]*)""#).expect("sheet name pattern"));
static DOCX_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<dc:title>([^<]*)</dc:title>").expect("docx title pattern"));
static DOCX_CREATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<dc:creator>([^<]*)</dc:creator>").expect("docx creator pattern"));
static DOCX_WORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Words>(\d+)</Words>").expect("docx words pattern"));
static PDF_PAGE_RE: LazyLock<regex::bytes::Regex> =
    LazyLock::new(|| regex::bytes::Regex::new(r"(?-u)/Type\s*/Page\b").expect("pdf page pattern"));
static PDF_TITLE_RE: LazyLock<regex::bytes::Regex> = LazyLock::new(|| {
    regex::bytes::Regex::new(r"(?-u)/Title\s*\(([^)]*)\)").expect("pdf title pattern")
});
static PDF_AUTHOR_RE: LazyLock<regex::bytes::Regex> = LazyLock::new(|| {
    regex::bytes::Regex::new(r"(?-u)/Author\s*\(([^)]*)\)").expect("pdf author pattern")
});

/// Entry in a directory listing.
#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

#[derive(Debug, Deserialize)]
pub struct ContentsQuery {
    /// Path relative to the document root (defaults to ".")
    #[serde(default = "default_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    /// Path relative to the document root
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Substring matched against file names (case-insensitive)
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    /// Look-back window in days
    #[serde(default = "default_days")]
    pub days: u64,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Destination directory relative to the document root
    #[serde(default)]
    pub path: String,
    /// Create the destination directory if it does not exist
    #[serde(default)]
    pub mkdir: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenameQuery {
    pub old_path: String,
    pub new_path: String,
}

fn default_path() -> String {
    ".".to_string()
}

fn default_days() -> u64 {
    3
}

#[derive(Debug, Serialize)]
pub struct ContentsResponse {
    pub path: String,
    pub entries: Vec<FileEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub matches: Vec<FileEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub days: u64,
    pub files: Vec<FileEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub filename: String,
    pub original_name: String,
    pub path: String,
    pub size: u64,
    pub mimetype: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<UploadedFile>,
    pub total_size: u64,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PdfInfoResponse {
    pub pages: usize,
    pub size: u64,
    pub modified: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OfficeInfoResponse {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slides: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<u64>,
}

// ============================================================================
// Path helpers
// ============================================================================

/// Build an absolute path under `root` from a client-supplied relative path,
/// rejecting any traversal attempt before touching the filesystem.
fn resolve_path(root: &Path, relative: &str) -> Result<PathBuf, FilesError> {
    let relative = relative.trim().trim_start_matches('/');
    if relative.is_empty() || relative == "." {
        return Ok(root.to_path_buf());
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => {
                if name.to_string_lossy().contains('\0') {
                    return Err(FilesError::PathTraversal);
                }
                resolved.push(name);
            }
            Component::CurDir => continue,
            // Parent references always indicate an escape attempt, even when
            // they would resolve back inside the root.
            Component::ParentDir => {
                warn!("rejected parent directory reference in {relative:?}");
                return Err(FilesError::PathTraversal);
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(FilesError::PathTraversal);
            }
        }
    }

    if !resolved.starts_with(root) {
        return Err(FilesError::PathTraversal);
    }
    Ok(resolved)
}

/// Resolve a path and, when it exists, canonicalize it to close the symlink
/// escape window left open by the purely lexical check above.
fn resolve_and_verify_path(root: &Path, relative: &str) -> Result<PathBuf, FilesError> {
    let resolved = resolve_path(root, relative)?;

    if resolved.exists() {
        let canonical_root = root.canonicalize()?;
        let canonical = resolved.canonicalize()?;
        if !canonical.starts_with(&canonical_root) {
            warn!("symlink escape: {resolved:?} resolves outside the root");
            return Err(FilesError::PathTraversal);
        }
        return Ok(canonical);
    }

    if let Some(parent) = resolved.parent() {
        if parent.exists() {
            let canonical_root = root.canonicalize()?;
            let canonical_parent = parent.canonicalize()?;
            if !canonical_parent.starts_with(&canonical_root) {
                return Err(FilesError::PathTraversal);
            }
        }
    }
    Ok(resolved)
}

/// Strip a client-supplied filename down to a single safe path component.
fn sanitize_filename(filename: &str) -> Option<String> {
    let cleaned: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ' ' => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.len() > 255 {
        return Some(cleaned[..255].to_string());
    }
    Some(cleaned.to_string())
}

/// Backup name for a deleted entry: timestamp prefix keeps repeated deletes
/// of the same name from colliding.
fn backup_file_name(name: &str) -> String {
    format!("{}_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"), name)
}

/// Pick a destination that does not clobber an existing file by appending a
/// timestamp before the extension.
fn dedup_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    dir.join(format!("{stem}_{stamp}{ext}"))
}

/// Whether the scope admits a relative path, judged by its first component.
fn scope_allows_path(scope: &ViewerScope, relative: &str) -> bool {
    if scope.full_access {
        return true;
    }
    let relative = relative.trim().trim_start_matches('/');
    if relative.is_empty() || relative == "." {
        // Root listings are filtered entry by entry instead.
        return true;
    }
    match Path::new(relative).components().next() {
        Some(Component::Normal(first)) => scope.allows(&first.to_string_lossy()),
        _ => true,
    }
}

fn entry_from_metadata(name: String, path: String, meta: &std::fs::Metadata) -> FileEntry {
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());

    if meta.is_dir() {
        FileEntry {
            name,
            path,
            entry_type: EntryType::Directory,
            size: None,
            modified,
            mimetype: None,
        }
    } else {
        let mimetype = mime_guess::from_path(&name)
            .first()
            .map(|m| m.essence_str().to_string());
        FileEntry {
            name,
            path,
            entry_type: EntryType::File,
            size: Some(meta.len()),
            modified,
            mimetype,
        }
    }
}

fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

// ============================================================================
// Handlers
// ============================================================================

/// List the immediate contents of a directory. For callers with a restricted
/// scope, top-level entries are filtered to their granted resources.
pub async fn contents(
    State(state): State<FilesState>,
    scope: ViewerScope,
    Query(query): Query<ContentsQuery>,
) -> Result<Json<ContentsResponse>, FilesError> {
    if !scope_allows_path(&scope, &query.path) {
        return Err(FilesError::NotFound(query.path.clone()));
    }

    let dir = resolve_and_verify_path(&state.remote_dir, &query.path)?;
    if !dir.exists() {
        return Err(FilesError::NotFound(query.path.clone()));
    }
    if !dir.is_dir() {
        return Err(FilesError::NotADirectory);
    }

    let at_root = dir
        == state
            .remote_dir
            .canonicalize()
            .unwrap_or_else(|_| state.remote_dir.clone());

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(&dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if state.config.is_hidden_dir(&name) {
            continue;
        }
        let meta = entry.metadata().await?;
        if at_root && meta.is_dir() && !scope.allows(&name) {
            continue;
        }
        let path = relative_display(&state.remote_dir, &entry.path());
        entries.push(entry_from_metadata(name, path, &meta));
    }

    // Directories first, then case-insensitive by name.
    entries.sort_by(|a, b| {
        let rank = |e: &FileEntry| matches!(e.entry_type, EntryType::File);
        rank(a)
            .cmp(&rank(b))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let total = entries.len();
    Ok(Json(ContentsResponse {
        path: query.path,
        entries,
        total,
    }))
}

/// Search file names under the document root.
pub async fn search(
    State(state): State<FilesState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, FilesError> {
    let needle = query.q.to_lowercase();
    let mut matches = Vec::new();

    for entry in WalkDir::new(&state.remote_dir)
        .max_depth(state.config.max_depth)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && state.config.is_hidden_dir(&e.file_name().to_string_lossy()))
        })
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.to_lowercase().contains(&needle) {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            let path = relative_display(&state.remote_dir, entry.path());
            matches.push(entry_from_metadata(name, path, &meta));
        }
    }

    let total = matches.len();
    Ok(Json(SearchResponse {
        query: query.q,
        matches,
        total,
    }))
}

/// Files modified within the last `days` days, newest first.
pub async fn recent(
    State(state): State<FilesState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentResponse>, FilesError> {
    let days = if query.days == 0 { default_days() } else { query.days };
    let cutoff = std::time::SystemTime::now() - std::time::Duration::from_secs(days * 86_400);

    let mut files = Vec::new();
    for entry in WalkDir::new(&state.remote_dir)
        .max_depth(state.config.max_depth)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && state.config.is_hidden_dir(&e.file_name().to_string_lossy()))
        })
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(modified) = meta.modified() else { continue };
        if modified < cutoff {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let path = relative_display(&state.remote_dir, entry.path());
        files.push(entry_from_metadata(name, path, &meta));
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified));

    let total = files.len();
    Ok(Json(RecentResponse { days, files, total }))
}

/// Stream a file back as an attachment.
pub async fn download(
    State(state): State<FilesState>,
    Query(query): Query<FileQuery>,
) -> Result<Response, FilesError> {
    let path = resolve_and_verify_path(&state.remote_dir, &query.path)?;
    if !path.exists() {
        return Err(FilesError::NotFound(query.path));
    }
    if !path.is_file() {
        return Err(FilesError::NotAFile);
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let mimetype = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    let file = fs::File::open(&path).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    debug!("serving download {}", query.path);
    Ok((
        [
            (header::CONTENT_TYPE, mimetype),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Generate (and cache) a JPEG thumbnail for an image file.
pub async fn preview(
    State(state): State<FilesState>,
    Query(query): Query<FileQuery>,
) -> Result<Response, FilesError> {
    let path = resolve_and_verify_path(&state.remote_dir, &query.path)?;
    if !path.exists() {
        return Err(FilesError::NotFound(query.path));
    }
    if !path.is_file() {
        return Err(FilesError::NotAFile);
    }

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(FilesError::PreviewUnavailable(format!(
            "no thumbnail renderer for {mime}"
        )));
    }

    let (max_w, max_h) = state.config.thumbnail_size;
    let image = image::ImageReader::open(&path)
        .map_err(FilesError::Io)?
        .with_guessed_format()
        .map_err(FilesError::Io)?
        .decode()
        .map_err(|e| FilesError::PreviewUnavailable(e.to_string()))?;

    let thumbnail = image.thumbnail(max_w, max_h).to_rgb8();
    let mut buffer = Vec::new();
    thumbnail
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Jpeg)
        .map_err(|e| FilesError::PreviewUnavailable(e.to_string()))?;

    // Cache alongside other previews; serving does not depend on it.
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "preview".to_string());
    let cache_path = state.preview_dir.join(format!("thumb_{stem}.jpg"));
    if let Err(err) = fs::write(&cache_path, &buffer).await {
        warn!("failed to cache thumbnail at {cache_path:?}: {err}");
    }

    Ok((
        [(header::CONTENT_TYPE, "image/jpeg".to_string())],
        buffer,
    )
        .into_response())
}

/// Lenient PDF metadata: page count and document info scraped from the raw
/// object stream, plus filesystem facts. Full parsing belongs to the viewer.
pub async fn pdf_info(
    State(state): State<FilesState>,
    Query(query): Query<FileQuery>,
) -> Result<Json<PdfInfoResponse>, FilesError> {
    let path = resolve_and_verify_path(&state.remote_dir, &query.path)?;
    if !path.exists() {
        return Err(FilesError::NotFound(query.path));
    }
    if path.extension().is_none_or(|e| !e.eq_ignore_ascii_case("pdf")) {
        return Err(FilesError::TypeNotAllowed(query.path));
    }

    let meta = fs::metadata(&path).await?;
    let raw = fs::read(&path).await?;

    let pages = PDF_PAGE_RE.find_iter(&raw).count();
    let title = PDF_TITLE_RE
        .captures(&raw)
        .and_then(|c| c.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).to_string())
        .filter(|s| !s.is_empty());
    let author = PDF_AUTHOR_RE
        .captures(&raw)
        .and_then(|c| c.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).to_string())
        .filter(|s| !s.is_empty());

    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or_default();

    Ok(Json(PdfInfoResponse {
        pages,
        size: meta.len(),
        modified,
        title,
        author,
    }))
}

/// Serve a PDF inline for client-side page rendering.
pub async fn pdf_raw(
    State(state): State<FilesState>,
    Query(query): Query<FileQuery>,
) -> Result<Response, FilesError> {
    let path = resolve_and_verify_path(&state.remote_dir, &query.path)?;
    if !path.exists() {
        return Err(FilesError::NotFound(query.path));
    }
    if path.extension().is_none_or(|e| !e.eq_ignore_ascii_case("pdf")) {
        return Err(FilesError::TypeNotAllowed(query.path));
    }

    let file = fs::File::open(&path).await?;
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, "inline".to_string()),
        ],
        body,
    )
        .into_response())
}

/// Container-level info for office documents: sheet names for workbooks,
/// slide count for presentations, core properties for text documents.
pub async fn office_info(
    State(state): State<FilesState>,
    Query(query): Query<FileQuery>,
) -> Result<Json<OfficeInfoResponse>, FilesError> {
    let path = resolve_and_verify_path(&state.remote_dir, &query.path)?;
    if !path.exists() {
        return Err(FilesError::NotFound(query.path));
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let info = match ext.as_str() {
        "xlsx" => {
            let workbook = read_zip_entry(&path, "xl/workbook.xml")?;
            let sheets = XLSX_SHEET_RE
                .captures_iter(&workbook)
                .map(|c| c[1].to_string())
                .collect::<Vec<_>>();
            OfficeInfoResponse {
                kind: "xlsx",
                sheets: Some(sheets),
                slides: None,
                title: None,
                creator: None,
                words: None,
            }
        }
        "pptx" => {
            let slides = count_zip_entries(&path, "ppt/slides/slide")?;
            OfficeInfoResponse {
                kind: "pptx",
                sheets: None,
                slides: Some(slides),
                title: None,
                creator: None,
                words: None,
            }
        }
        "docx" => {
            let core = read_zip_entry(&path, "docProps/core.xml").unwrap_or_default();
            let app = read_zip_entry(&path, "docProps/app.xml").unwrap_or_default();
            OfficeInfoResponse {
                kind: "docx",
                sheets: None,
                slides: None,
                title: capture_text(&DOCX_TITLE_RE, &core),
                creator: capture_text(&DOCX_CREATOR_RE, &core),
                words: DOCX_WORDS_RE
                    .captures(&app)
                    .and_then(|c| c[1].parse().ok()),
            }
        }
        other => {
            return Err(FilesError::TypeNotAllowed(format!(
                "no document info for .{other} files"
            )));
        }
    };

    Ok(Json(info))
}

/// Upload one or more files from a multipart request.
pub async fn upload(
    State(state): State<FilesState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, FilesError> {
    let dest_dir = resolve_and_verify_path(&state.remote_dir, &query.path)?;
    if !dest_dir.exists() {
        if query.mkdir {
            fs::create_dir_all(&dest_dir).await?;
        } else {
            return Err(FilesError::NotFound(query.path.clone()));
        }
    }
    if !dest_dir.is_dir() {
        return Err(FilesError::NotADirectory);
    }

    let mut uploaded = Vec::new();
    let mut total_size = 0u64;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FilesError::InvalidPath(format!("malformed multipart body: {e}")))?
    {
        let Some(original_name) = field.file_name().map(|n| n.to_string()) else {
            continue;
        };

        let Some(safe_name) = sanitize_filename(&original_name) else {
            return Err(FilesError::InvalidPath(original_name));
        };
        if !state.config.is_allowed_file(&safe_name) {
            return Err(FilesError::TypeNotAllowed(original_name));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| FilesError::InvalidPath(format!("failed to read upload: {e}")))?;
        let size = data.len() as u64;
        if size > state.config.max_upload_size {
            return Err(FilesError::FileTooLarge {
                size,
                limit: state.config.max_upload_size,
            });
        }

        let destination = dedup_destination(&dest_dir, &safe_name);
        fs::write(&destination, &data).await?;

        let filename = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(safe_name);
        let mimetype = mime_guess::from_path(&destination)
            .first_or_octet_stream()
            .to_string();

        debug!("stored upload {original_name} as {filename}");
        total_size += size;
        uploaded.push(UploadedFile {
            path: relative_display(&state.remote_dir, &destination),
            filename,
            original_name,
            size,
            mimetype,
        });
    }

    Ok(Json(UploadResponse {
        message: format!("Successfully uploaded {} files", uploaded.len()),
        files: uploaded,
        total_size,
    }))
}

/// Move a file or directory into the backup area instead of unlinking it.
pub async fn delete_file(
    State(state): State<FilesState>,
    Query(query): Query<FileQuery>,
) -> Result<Json<SuccessResponse>, FilesError> {
    let path = resolve_and_verify_path(&state.remote_dir, &query.path)?;
    if !path.exists() {
        return Err(FilesError::NotFound(query.path));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or(FilesError::PathTraversal)?;

    fs::create_dir_all(&state.backup_dir).await?;
    let backup_path = state.backup_dir.join(backup_file_name(&name));
    fs::rename(&path, &backup_path).await?;

    Ok(Json(SuccessResponse {
        success: true,
        message: format!("{name} deleted"),
        path: Some(backup_path.to_string_lossy().to_string()),
    }))
}

/// Create a directory (and any missing parents) under the document root.
pub async fn create_dir(
    State(state): State<FilesState>,
    Query(query): Query<FileQuery>,
) -> Result<Json<SuccessResponse>, FilesError> {
    let path = resolve_and_verify_path(&state.remote_dir, &query.path)?;
    if path.exists() {
        return Err(FilesError::InvalidPath(format!(
            "{} already exists",
            query.path
        )));
    }

    fs::create_dir_all(&path).await?;

    Ok(Json(SuccessResponse {
        success: true,
        message: "directory created".to_string(),
        path: Some(relative_display(&state.remote_dir, &path)),
    }))
}

/// Rename or move an entry within the document root.
pub async fn rename(
    State(state): State<FilesState>,
    Query(query): Query<RenameQuery>,
) -> Result<Json<SuccessResponse>, FilesError> {
    let old_path = resolve_and_verify_path(&state.remote_dir, &query.old_path)?;
    let new_path = resolve_and_verify_path(&state.remote_dir, &query.new_path)?;

    if !old_path.exists() {
        return Err(FilesError::NotFound(query.old_path));
    }
    if new_path.exists() {
        return Err(FilesError::InvalidPath(format!(
            "{} already exists",
            query.new_path
        )));
    }

    fs::rename(&old_path, &new_path).await?;

    Ok(Json(SuccessResponse {
        success: true,
        message: "renamed".to_string(),
        path: Some(relative_display(&state.remote_dir, &new_path)),
    }))
}

// ============================================================================
// Zip container helpers
// ============================================================================

fn read_zip_entry(path: &Path, entry: &str) -> Result<String, FilesError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| FilesError::PreviewUnavailable(format!("not a valid container: {e}")))?;
    let mut zipped = archive
        .by_name(entry)
        .map_err(|e| FilesError::PreviewUnavailable(format!("missing {entry}: {e}")))?;
    let mut content = String::new();
    zipped.read_to_string(&mut content)?;
    Ok(content)
}

fn count_zip_entries(path: &Path, prefix: &str) -> Result<usize, FilesError> {
    let file = std::fs::File::open(path)?;
    let archive = zip::ZipArchive::new(file)
        .map_err(|e| FilesError::PreviewUnavailable(format!("not a valid container: {e}")))?;
    Ok(archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .count())
}

fn capture_text(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .map(|c| c[1].to_string())
        .filter(|s| !s.is_empty())
}
