//! Provenance carried inside each archive
//!
//! The first line of an archive is an HTML comment holding a JSON object
//! with the source URL, title and archive time, so the registry can describe
//! an archive without sidecar files. The visible banner repeats the source
//! and time for readers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

const COMMENT_PREFIX: &str = "<!-- site-archiver ";
const COMMENT_SUFFIX: &str = " -->";

/// Metadata embedded in an archive's first line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub source_url: String,
    pub title: String,
    pub archived_at: DateTime<Utc>,
}

impl ArchiveMetadata {
    /// Render as a single-line HTML comment
    ///
    /// `--` may not appear inside a comment, so it is written as JSON unicode
    /// escapes, which parse back to the same string.
    #[must_use]
    pub fn to_comment(&self) -> String {
        let json = serde_json::json!({
            "source_url": self.source_url,
            "title": self.title,
            "archived_at": self.archived_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
        .to_string()
        .replace("--", "\\u002d\\u002d");
        format!("{COMMENT_PREFIX}{json}{COMMENT_SUFFIX}")
    }

    /// Parse the comment written by [`ArchiveMetadata::to_comment`]
    #[must_use]
    pub fn from_comment(line: &str) -> Option<Self> {
        let json = line
            .trim()
            .strip_prefix(COMMENT_PREFIX)?
            .strip_suffix(COMMENT_SUFFIX)?;
        match serde_json::from_str(json) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                log::debug!("Ignoring malformed provenance comment: {e}");
                None
            }
        }
    }
}

/// Visible banner naming the source and archive time
#[must_use]
pub fn banner_html(source_url: &str, archived_at: DateTime<Utc>) -> String {
    let href = html_escape::encode_double_quoted_attribute(source_url);
    let text = html_escape::encode_text(source_url);
    format!(
        "<div class=\"site-archiver-banner\" style=\"font:12px sans-serif;padding:4px 8px;\
         background:#fffbe6;border-bottom:1px solid #e0d890;color:#333\">\
         Archived from <a href=\"{href}\">{text}</a> on {}</div>",
        archived_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}
