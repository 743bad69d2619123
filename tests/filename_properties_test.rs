//! Property tests for archive filename construction

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use site_archiver::content_saver::archive_filename;
use site_archiver::utils::sanitize_component;
use url::Url;

proptest! {
    #[test]
    fn sanitized_components_are_filename_safe(raw in "\\PC{0,200}") {
        let sanitized = sanitize_component(&raw);
        prop_assert!(sanitized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        prop_assert!(sanitized.len() <= 50);
        prop_assert!(!sanitized.starts_with('_'));
        prop_assert!(!sanitized.ends_with('_'));
        prop_assert!(!sanitized.contains("__"));
    }

    #[test]
    fn sanitizing_is_idempotent(raw in "\\PC{0,120}") {
        let once = sanitize_component(&raw);
        prop_assert_eq!(sanitize_component(&once), once);
    }

    #[test]
    fn filenames_keep_their_shape(title in "\\PC{0,80}", host in "[a-z][a-z0-9-]{0,19}(\\.[a-z]{2,6}){0,2}") {
        let url = Url::parse(&format!("https://{host}/")).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let name = archive_filename(&title, &url, at);

        prop_assert!(name.starts_with("2024_01_01_120000_"));
        prop_assert!(name.ends_with(".html"));
        let stem = name.trim_end_matches(".html");
        let (title_part, host_part) = stem["2024_01_01_120000_".len()..]
            .rsplit_once('-')
            .unwrap();
        prop_assert!(!title_part.is_empty());
        prop_assert!(!host_part.is_empty());
        prop_assert!(!title_part.contains('-'));
    }
}

#[test]
fn unicode_titles_fall_back_to_untitled() {
    let url = Url::parse("https://example.com/").unwrap();
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    assert_eq!(
        archive_filename("日本語のページ", &url, at),
        "2024_01_01_120000_untitled-example_com.html"
    );
}
