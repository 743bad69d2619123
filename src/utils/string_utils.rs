//! Filename and text helpers
//!
//! Archive filenames are built from page titles and hosts, which can contain
//! anything. Everything here is UTF-8 safe and never panics on multi-byte input.

use super::constants::MAX_FILENAME_COMPONENT_LEN;

/// Safely truncate a string to a maximum number of CHARACTERS (not bytes).
///
/// # Examples
/// ```
/// # use site_archiver::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
/// assert_eq!(safe_truncate_chars("🎉🎊🎈", 2), "🎉🎊");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
#[must_use]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Reduce a title or host to a filename component
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`, runs of `_` collapse
/// to one, the result is cut to 50 characters and leading/trailing `_` are
/// trimmed. The output may be empty.
///
/// ```
/// # use site_archiver::utils::string_utils::sanitize_component;
/// assert_eq!(sanitize_component("Example Title"), "Example_Title");
/// assert_eq!(sanitize_component("example.com"), "example_com");
/// assert_eq!(sanitize_component("  -- Hello, World! --  "), "Hello_World");
/// ```
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    let mut sanitized = String::with_capacity(raw.len().min(MAX_FILENAME_COMPONENT_LEN * 2));
    let mut last_was_underscore = false;

    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        sanitized.push(c);
    }

    // Only ASCII remains, so byte and char counts agree
    let trimmed = sanitized.trim_start_matches('_');
    let cut = safe_truncate_chars(trimmed, MAX_FILENAME_COMPONENT_LEN);
    cut.trim_end_matches('_').to_string()
}

/// Collapse all whitespace runs to single spaces and trim the ends
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape square brackets so a title can sit inside a markdown link label
#[must_use]
pub fn escape_markdown_label(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
