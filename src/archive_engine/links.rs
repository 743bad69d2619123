//! Trigger-token processing for free-form text
//!
//! A `+https://...` token in user text asks for the link to be archived.
//! Each token is replaced by a markdown link to the archive on success and
//! left exactly as written on failure.

use std::collections::HashMap;
use std::sync::LazyLock;

use futures::future::join_all;
use regex::Regex;

use super::archiver::Archiver;
use super::errors::ArchiveError;
use super::job::{ArchiveRequest, ArchiveResult};
use crate::utils::escape_markdown_label;

static TRIGGER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+https?://[^\s)]+").expect("TRIGGER_TOKEN: hardcoded regex is valid")
});

/// Outcome of processing one piece of text
#[derive(Debug)]
pub struct LinkProcessingReport {
    /// Text with every successful token substituted
    pub text: String,
    pub archived: Vec<ArchiveResult>,
    /// Tokens left in place, with the reason
    pub failed: Vec<(String, ArchiveError)>,
}

/// Every trigger token in `text`, with the span of the token (including `+`)
#[must_use]
pub fn find_trigger_tokens(text: &str) -> Vec<ArchiveRequest> {
    TRIGGER_TOKEN
        .find_iter(text)
        .map(|m| ArchiveRequest::with_span(&m.as_str()[1..], m.range()))
        .collect()
}

/// Markdown that replaces a token once its page is archived
#[must_use]
pub fn substitution_text(result: &ArchiveResult) -> String {
    format!(
        "[{}]({}) (archived {})",
        escape_markdown_label(&result.title),
        result.path,
        result.archived_at.format("%Y-%m-%d %H:%M")
    )
}

/// Archive every trigger token in `text` and substitute the results
///
/// Jobs run concurrently; a URL that appears more than once is archived
/// once and every occurrence gets the same link.
pub async fn process_archive_links(text: &str, archiver: &Archiver) -> LinkProcessingReport {
    let requests = find_trigger_tokens(text);
    if requests.is_empty() {
        return LinkProcessingReport {
            text: text.to_string(),
            archived: Vec::new(),
            failed: Vec::new(),
        };
    }

    let mut unique: Vec<&ArchiveRequest> = Vec::new();
    for request in &requests {
        if !unique.iter().any(|r| r.source_url == request.source_url) {
            unique.push(request);
        }
    }
    log::debug!(
        "Found {} trigger tokens ({} distinct URLs)",
        requests.len(),
        unique.len()
    );

    let outcomes = join_all(unique.iter().map(|request| archiver.archive(request))).await;

    let mut substitutions: HashMap<&str, String> = HashMap::new();
    let mut archived = Vec::new();
    let mut failed = Vec::new();
    for (request, outcome) in unique.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                substitutions.insert(request.source_url.as_str(), substitution_text(&result));
                archived.push(result);
            }
            Err(error) => failed.push((format!("+{}", request.source_url), error)),
        }
    }

    let mut output = text.to_string();
    for request in requests.iter().rev() {
        if let Some(replacement) = substitutions.get(request.source_url.as_str())
            && let Some(span) = &request.span
        {
            output.replace_range(span.clone(), replacement);
        }
    }

    LinkProcessingReport {
        text: output,
        archived,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn tokens_stop_at_whitespace_and_closing_paren() {
        let text = "see +https://a.com/x and (+http://b.org/y) but not https://c.net";
        let tokens = find_trigger_tokens(text);
        let urls: Vec<_> = tokens.iter().map(|r| r.source_url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/x", "http://b.org/y"]);
        assert_eq!(&text[tokens[0].span.clone().unwrap()], "+https://a.com/x");
    }

    #[test]
    fn substitution_uses_markdown_link_and_minute_timestamp() {
        let result = ArchiveResult {
            title: "[Draft] Example".into(),
            path: "assets/sites/2024_01_01_120000_Draft_Example-example_com.html".into(),
            archived_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 59).unwrap(),
            source_url: "https://example.com/page".into(),
        };
        assert_eq!(
            substitution_text(&result),
            "[\\[Draft\\] Example](assets/sites/2024_01_01_120000_Draft_Example-example_com.html) \
             (archived 2024-01-01 12:00)"
        );
    }
}
