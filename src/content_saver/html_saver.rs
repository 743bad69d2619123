//! Archive naming and persistence

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tempfile::NamedTempFile;
use url::Url;

use crate::utils::{collapse_whitespace, sanitize_component};

lazy_static! {
    // Hardcoded selector; failing to parse would be a compile-time bug.
    static ref TITLE_SELECTOR: Selector =
        Selector::parse("title").expect("BUG: hardcoded CSS selector 'title' is invalid");
}

/// Timestamp layout at the start of every archive filename
pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H%M%S";

/// Text of the first non-empty `<title>` element, whitespace collapsed
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&TITLE_SELECTOR)
        .map(|title| collapse_whitespace(&title.text().collect::<String>()))
        .find(|title| !title.is_empty())
}

/// Title for an archive: the page title, else the host
#[must_use]
pub fn archive_title(html: &str, url: &Url) -> String {
    extract_title(html).unwrap_or_else(|| url.host_str().unwrap_or_default().to_string())
}

/// `<YYYY_MM_DD_HHMMSS>_<title>-<host>.html`
///
/// Both components go through [`sanitize_component`]. Components that
/// sanitize to nothing become `untitled` and `site` so the name keeps its
/// shape.
#[must_use]
pub fn archive_filename(title: &str, url: &Url, archived_at: DateTime<Utc>) -> String {
    let title = sanitize_component(title);
    let host = sanitize_component(url.host_str().unwrap_or_default());
    format!(
        "{}_{}-{}.html",
        archived_at.format(FILENAME_TIMESTAMP_FORMAT),
        if title.is_empty() { "untitled" } else { &title },
        if host.is_empty() { "site" } else { &host },
    )
}

/// Highest `_N` suffix tried before giving up on a name
const MAX_NAME_SUFFIX: u32 = 1000;

/// `stem_N.ext`, the name tried when `filename` is taken
fn numbered(filename: &str, n: u32) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{n}.{ext}"),
        None => format!("{filename}_{n}"),
    }
}

/// Write `document` to `dir/filename` in one step, returning the final path
///
/// The content goes to a temp file in the same directory which is then
/// renamed into place without replacing an existing file, so a reader never
/// observes a partial archive and an existing archive is never overwritten.
/// A taken name is retried as `stem_2.html`, `stem_3.html` and so on.
///
/// # Errors
///
/// Any I/O error. `AlreadyExists` only once every suffix is taken.
pub async fn save_archive(dir: &Path, filename: &str, document: String) -> std::io::Result<PathBuf> {
    let dir = dir.to_path_buf();
    let filename = filename.to_string();

    let target = tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&dir)?;
        let mut temp_file = NamedTempFile::new_in(&dir)?;
        temp_file.write_all(document.as_bytes())?;
        temp_file.as_file().sync_all()?;

        let mut target = dir.join(&filename);
        for n in 2..=MAX_NAME_SUFFIX + 1 {
            match temp_file.persist_noclobber(&target) {
                Ok(_) => return Ok(target),
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists && n <= MAX_NAME_SUFFIX => {
                    log::debug!("{} exists, trying suffix _{n}", target.display());
                    temp_file = e.file;
                    target = dir.join(numbered(&filename, n));
                }
                Err(e) => return Err(e.error),
            }
        }
        Err(std::io::ErrorKind::AlreadyExists.into())
    })
    .await
    .map_err(|e| std::io::Error::other(format!("archive write task failed: {e}")))??;

    log::debug!("Wrote archive {}", target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn title_comes_from_title_element() {
        let html = "<html><head><title>\n  Example\tTitle  </title></head></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Example Title"));
    }

    #[test]
    fn missing_or_blank_title_falls_back_to_host() {
        let url = Url::parse("https://example.com/page").unwrap();
        assert_eq!(archive_title("<p>no head</p>", &url), "example.com");
        assert_eq!(archive_title("<title>   </title>", &url), "example.com");
    }

    #[test]
    fn filename_matches_the_documented_layout() {
        let url = Url::parse("https://example.com/page").unwrap();
        assert_eq!(
            archive_filename("Example Title", &url, noon()),
            "2024_01_01_120000_Example_Title-example_com.html"
        );
    }

    #[test]
    fn unusable_title_becomes_untitled() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(
            archive_filename("日本語", &url, noon()),
            "2024_01_01_120000_untitled-127_0_0_1.html"
        );
    }

    #[test]
    fn numbered_names_keep_the_extension() {
        assert_eq!(numbered("2024_01_01_120000_A-b.html", 2), "2024_01_01_120000_A-b_2.html");
        assert_eq!(numbered("plain", 3), "plain_3");
    }

    #[tokio::test]
    async fn taken_names_get_a_suffix_instead_of_overwriting() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = root.path().join("assets").join("sites");

        let first = save_archive(&dir, "a.html", "<p>first</p>".into())
            .await
            .unwrap();
        let second = save_archive(&dir, "a.html", "<p>second</p>".into())
            .await
            .unwrap();
        let third = save_archive(&dir, "a.html", "<p>third</p>".into())
            .await
            .unwrap();

        assert_eq!(first, dir.join("a.html"));
        assert_eq!(second, dir.join("a_2.html"));
        assert_eq!(third, dir.join("a_3.html"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "<p>first</p>");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "<p>second</p>");
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_name_all_land() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = root.path().to_path_buf();

        let writes = (0..4).map(|i| save_archive(&dir, "same.html", format!("<p>{i}</p>")));
        let paths = futures::future::join_all(writes).await;

        let mut names: Vec<_> = paths
            .into_iter()
            .map(|path| path.unwrap().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["same.html", "same_2.html", "same_3.html", "same_4.html"]);
    }
}
