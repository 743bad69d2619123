//! Test utilities and helper functions for the site_archiver test suite

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use mockito::{Mock, Server};
use site_archiver::{ArchiveConfig, Archiver};
use tempfile::TempDir;

/// A 1x1 transparent PNG
#[allow(dead_code)]
pub const PNG_FIXTURE: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Creates a temporary directory to act as a project root
#[allow(dead_code)]
pub fn create_test_dir() -> TempDir {
    TempDir::new().expect("failed to create temp dir")
}

/// 2024-01-01 12:00:00 UTC
#[allow(dead_code)]
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// Archiver rooted at `root` with the clock fixed to [`noon`]
#[allow(dead_code)]
pub fn fixed_archiver(root: &Path) -> Archiver {
    let config = ArchiveConfig::builder()
        .project_root(root)
        .build()
        .expect("valid config");
    Archiver::new(config).expect("client").with_clock(noon)
}

/// Creates a test HTML document with specified content
#[allow(dead_code)]
pub fn create_test_html(title: &str, head: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{}</title>
    {head}
</head>
<body>
    {body}
</body>
</html>"#,
        html_escape::encode_text(title),
    )
}

/// Serve `html` at `path`
#[allow(dead_code)]
pub async fn mock_page(server: &mut Server, path: &str, html: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(html)
        .create_async()
        .await
}

/// Serve `body` at `path` with the given content type
#[allow(dead_code)]
pub async fn mock_resource(
    server: &mut Server,
    path: &str,
    content_type: &str,
    body: impl AsRef<[u8]>,
) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", content_type)
        .with_body(body)
        .create_async()
        .await
}

/// Respond to `path` with a bare status code
#[allow(dead_code)]
pub async fn mock_status(server: &mut Server, path: &str, status: usize) -> Mock {
    server
        .mock("GET", path)
        .with_status(status)
        .create_async()
        .await
}

/// Files currently in `dir`, empty if it does not exist
#[allow(dead_code)]
pub fn files_in(dir: &Path) -> Vec<String> {
    let Ok(reader) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = reader
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
