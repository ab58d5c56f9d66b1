//! File API integration tests: role gating, storage round trips, traversal
//! rejection and permission-scoped listings, driven through the real router.

use std::io::Write;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;

mod common;
use common::{
    FakeProvider, claims, multipart_body, remote_dir, test_app, with_realm_roles,
};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn authed(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(header::AUTHORIZATION, "Bearer token")
}

fn admin_provider() -> std::sync::Arc<FakeProvider> {
    FakeProvider::new(with_realm_roles(claims(), &["admin"]))
}

fn viewer_provider() -> std::sync::Arc<FakeProvider> {
    FakeProvider::new(with_realm_roles(claims(), &["viewer"]))
}

/// Uploads are admin-only; a viewer is refused with the policy reason.
#[tokio::test]
async fn test_upload_requires_admin_role() {
    let (app, _dir) = test_app(viewer_provider());

    let (content_type, body) = multipart_body("notes.txt", b"hello");
    let request = authed(Method::POST, "/api/files/upload")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error_code"], "insufficient_permissions");
    assert!(json["error"].as_str().unwrap().contains("admin"));
}

/// Upload stores the file under the document root.
#[tokio::test]
async fn test_upload_stores_file() {
    let (app, dir) = test_app(admin_provider());

    let (content_type, body) = multipart_body("notes.txt", b"hello world");
    let request = authed(Method::POST, "/api/files/upload")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["files"][0]["filename"], "notes.txt");
    assert_eq!(json["total_size"], 11);

    let stored = std::fs::read_to_string(remote_dir(&dir).join("notes.txt")).unwrap();
    assert_eq!(stored, "hello world");
}

/// Extensions outside the allow-list are refused.
#[tokio::test]
async fn test_upload_rejects_disallowed_extension() {
    let (app, dir) = test_app(admin_provider());

    let (content_type, body) = multipart_body("payload.exe", b"MZ");
    let request = authed(Method::POST, "/api/files/upload")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!remote_dir(&dir).join("payload.exe").exists());
}

/// Download streams the stored bytes back with an attachment disposition.
#[tokio::test]
async fn test_download_round_trip() {
    let (app, dir) = test_app(viewer_provider());
    std::fs::write(remote_dir(&dir).join("report.txt"), b"quarterly numbers").unwrap();

    let request = authed(Method::GET, "/api/files/download?path=report.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains("report.txt"));

    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"quarterly numbers");
}

/// Traversal attempts are refused, not resolved.
#[tokio::test]
async fn test_download_rejects_traversal() {
    let (app, _dir) = test_app(viewer_provider());

    let request = authed(Method::GET, "/api/files/download?path=../../etc/passwd")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PATH_TRAVERSAL");
}

/// Delete is admin-only and moves the file into the backup area.
#[tokio::test]
async fn test_delete_moves_to_backup() {
    let (app, dir) = test_app(admin_provider());
    std::fs::write(remote_dir(&dir).join("old.txt"), b"stale").unwrap();

    let request = authed(Method::DELETE, "/api/files/file?path=old.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!remote_dir(&dir).join("old.txt").exists());

    let backups: Vec<_> = std::fs::read_dir(common::backup_dir(&dir))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].ends_with("_old.txt"));
}

/// A viewer may not delete.
#[tokio::test]
async fn test_delete_requires_admin_role() {
    let (app, dir) = test_app(viewer_provider());
    std::fs::write(remote_dir(&dir).join("keep.txt"), b"data").unwrap();

    let request = authed(Method::DELETE, "/api/files/file?path=keep.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(remote_dir(&dir).join("keep.txt").exists());
}

/// Directory creation works for admins and shows up in listings.
#[tokio::test]
async fn test_mkdir_and_contents() {
    let (app, dir) = test_app(admin_provider());

    let request = authed(Method::PUT, "/api/files/mkdir?path=reports")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(remote_dir(&dir).join("reports").is_dir());

    let request = authed(Method::GET, "/api/files/contents")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["entries"][0]["name"], "reports");
    assert_eq!(json["entries"][0]["type"], "directory");
}

/// Root listings are filtered to granted resources for restricted callers;
/// admins see everything.
#[tokio::test]
async fn test_contents_filtered_by_resource_permissions() {
    let provider =
        FakeProvider::with_permissions(with_realm_roles(claims(), &["viewer"]), &["reports"]);
    let (app, dir) = test_app(provider);
    std::fs::create_dir(remote_dir(&dir).join("reports")).unwrap();
    std::fs::create_dir(remote_dir(&dir).join("finance")).unwrap();

    let request = authed(Method::GET, "/api/files/contents")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let names: Vec<&str> = json["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["reports"]);

    // The ungranted directory is not reachable directly either.
    let request = authed(Method::GET, "/api/files/contents?path=finance")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// An admin sees unfiltered listings.
#[tokio::test]
async fn test_contents_unfiltered_for_admin() {
    let (app, dir) = test_app(admin_provider());
    std::fs::create_dir(remote_dir(&dir).join("reports")).unwrap();
    std::fs::create_dir(remote_dir(&dir).join("finance")).unwrap();

    let request = authed(Method::GET, "/api/files/contents")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let json = body_json(response).await;
    let names: Vec<&str> = json["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["finance", "reports"]);
}

/// Search matches file names case-insensitively.
#[tokio::test]
async fn test_search_matches_names() {
    let (app, dir) = test_app(viewer_provider());
    std::fs::write(remote_dir(&dir).join("Quarterly_Report.txt"), b"x").unwrap();
    std::fs::write(remote_dir(&dir).join("unrelated.txt"), b"y").unwrap();

    let request = authed(Method::GET, "/api/files/search?q=report")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["matches"][0]["name"], "Quarterly_Report.txt");
}

/// Freshly written files appear in the recent listing.
#[tokio::test]
async fn test_recent_lists_new_files() {
    let (app, dir) = test_app(viewer_provider());
    std::fs::write(remote_dir(&dir).join("new.txt"), b"x").unwrap();

    let request = authed(Method::GET, "/api/files/recent?days=1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["files"][0]["name"], "new.txt");
}

/// PDF info counts page objects leniently.
#[tokio::test]
async fn test_pdf_info_counts_pages() {
    let (app, dir) = test_app(viewer_provider());
    let raw: &[u8] = b"%PDF-1.4\n\
        1 0 obj\n<< /Type /Pages /Count 2 /Kids [2 0 R 3 0 R] >>\nendobj\n\
        2 0 obj\n<< /Type /Page /Parent 1 0 R >>\nendobj\n\
        3 0 obj\n<< /Type /Page /Parent 1 0 R >>\nendobj\n\
        trailer\n<< /Info << /Title (Quarterly) >> >>\n%%EOF\n";
    std::fs::write(remote_dir(&dir).join("q1.pdf"), raw).unwrap();

    let request = authed(Method::GET, "/api/files/pdf/info?path=q1.pdf")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["pages"], 2);
    assert_eq!(json["title"], "Quarterly");
}

/// Raw PDFs stream inline for client-side rendering.
#[tokio::test]
async fn test_pdf_raw_streams_inline() {
    let (app, dir) = test_app(viewer_provider());
    std::fs::write(remote_dir(&dir).join("q1.pdf"), b"%PDF-1.4\n%%EOF\n").unwrap();

    let request = authed(Method::GET, "/api/files/pdf/raw?path=q1.pdf")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok()),
        Some("application/pdf")
    );
}

/// Workbook sheet names come out of the container inspection.
#[tokio::test]
async fn test_office_info_xlsx_sheets() {
    let (app, dir) = test_app(viewer_provider());

    let file = std::fs::File::create(remote_dir(&dir).join("book.xlsx")).unwrap();
    let mut archive = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    archive.start_file("xl/workbook.xml", options).unwrap();
    archive
        .write_all(
            br#"<workbook><sheets>
                <sheet name="Summary" sheetId="1"/>
                <sheet name="Raw Data" sheetId="2"/>
            </sheets></workbook>"#,
        )
        .unwrap();
    archive.finish().unwrap();

    let request = authed(Method::GET, "/api/files/office/info?path=book.xlsx")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "xlsx");
    assert_eq!(json["sheets"], serde_json::json!(["Summary", "Raw Data"]));
}

/// Rename moves an entry within the tree, admin-only.
#[tokio::test]
async fn test_rename_moves_entry() {
    let (app, dir) = test_app(admin_provider());
    std::fs::write(remote_dir(&dir).join("draft.txt"), b"v1").unwrap();

    let request = authed(
        Method::POST,
        "/api/files/rename?old_path=draft.txt&new_path=final.txt",
    )
    .body(Body::empty())
    .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!remote_dir(&dir).join("draft.txt").exists());
    assert!(remote_dir(&dir).join("final.txt").exists());
}
