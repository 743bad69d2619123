//! Stylesheet expansion
//!
//! Locates `@import` rules and `url()` functions by syntactic position
//! (comments and quoted strings are skipped, so `/* url(x.png) */` is never
//! touched), then:
//! - splices each imported stylesheet, itself expanded, in place of its rule
//!   until the depth cap is reached
//! - replaces each image or font `url()` with a base64 data URI
//!
//! Every reference is handled independently. A failed fetch leaves that one
//! reference byte-identical and the rest of the stylesheet is still emitted.
//! Downloads run concurrently but results are spliced in source order.

use std::ops::Range;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use url::Url;

use super::classifier::{classify, encode_data_uri, resolve_mime};
use super::downloaders::ResourceDownloader;
use super::types::{InliningError, MarkupContext, ResourceKind};
use crate::utils::{is_data_uri, resolve_url};

/// A reference found in stylesheet text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssReference {
    /// `@import "x.css" <media>;`, `span` covers the whole rule
    Import {
        span: Range<usize>,
        target: String,
        media: String,
    },
    /// `url(x.png)`, `span` covers the function
    Url { span: Range<usize>, target: String },
}

impl CssReference {
    #[must_use]
    pub fn span(&self) -> &Range<usize> {
        match self {
            CssReference::Import { span, .. } | CssReference::Url { span, .. } => span,
        }
    }
}

/// Expanded stylesheet with per-reference accounting
#[derive(Debug, Clone, Default)]
pub struct CssExpansion {
    pub css: String,
    pub successes: usize,
    pub failures: Vec<InliningError>,
}

#[derive(Default)]
struct Outcome {
    replacement: Option<String>,
    successes: usize,
    failures: Vec<InliningError>,
}

impl Outcome {
    fn untouched() -> Self {
        Self::default()
    }

    fn failed(url: &Url, kind: ResourceKind, error: String) -> Self {
        log::warn!("Failed to inline {kind} from {url}: {error}");
        Self {
            replacement: None,
            successes: 0,
            failures: vec![InliningError {
                url: url.to_string(),
                kind,
                error,
            }],
        }
    }
}

/// Expands stylesheets for one job
#[derive(Debug, Clone, Copy)]
pub struct CssProcessor<'a> {
    downloader: &'a ResourceDownloader,
    max_concurrent: usize,
}

impl<'a> CssProcessor<'a> {
    #[must_use]
    pub fn new(downloader: &'a ResourceDownloader, max_concurrent: usize) -> Self {
        Self {
            downloader,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Expand `@import` rules and media `url()` references
    ///
    /// `depth` is the import nesting of `css` itself: a linked stylesheet is
    /// depth 0. Rules found at the depth cap are left untouched.
    pub fn expand(&self, css: String, base: Url, depth: usize) -> BoxFuture<'a, CssExpansion> {
        let this = *self;
        Box::pin(async move { this.process(css, base, depth, true).await })
    }

    /// Rewrite media `url()` references only, as for a `style` attribute
    pub async fn rewrite_urls(&self, css: &str, base: &Url) -> CssExpansion {
        self.process(css.to_string(), base.clone(), 0, false).await
    }

    async fn process(self, css: String, base: Url, depth: usize, imports: bool) -> CssExpansion {
        let references = scan_references(&css);
        if references.is_empty() {
            return CssExpansion {
                css,
                ..CssExpansion::default()
            };
        }

        let pending: Vec<_> = references
            .iter()
            .map(|reference| self.resolve_reference(reference, &base, depth, imports))
            .collect();
        let outcomes: Vec<Outcome> = stream::iter(pending)
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut expansion = CssExpansion {
            css: String::with_capacity(css.len()),
            ..CssExpansion::default()
        };
        let mut cursor = 0;
        for (reference, outcome) in references.iter().zip(outcomes) {
            expansion.successes += outcome.successes;
            expansion.failures.extend(outcome.failures);
            if let Some(replacement) = outcome.replacement {
                let span = reference.span();
                expansion.css.push_str(&css[cursor..span.start]);
                expansion.css.push_str(&replacement);
                cursor = span.end;
            }
        }
        expansion.css.push_str(&css[cursor..]);
        expansion
    }

    async fn resolve_reference(
        self,
        reference: &CssReference,
        base: &Url,
        depth: usize,
        imports: bool,
    ) -> Outcome {
        match reference {
            CssReference::Import { target, media, .. } => {
                if !imports {
                    return Outcome::untouched();
                }
                self.expand_import(target, media, base, depth).await
            }
            CssReference::Url { target, .. } => self.inline_url(target, base).await,
        }
    }

    async fn expand_import(&self, target: &str, media: &str, base: &Url, depth: usize) -> Outcome {
        let max_depth = self.downloader.budget().max_css_depth;
        if depth >= max_depth {
            log::debug!("Import depth cap ({max_depth}) reached, keeping @import of {target}");
            return Outcome::untouched();
        }
        if !can_splice(media) {
            log::debug!("Keeping @import of {target} with unsupported condition '{media}'");
            return Outcome::untouched();
        }
        let Some(url) = resolve_url(base, target) else {
            return Outcome::untouched();
        };

        let kind = classify(Some(MarkupContext::CssImport), Some(&url), None);
        let fetched = match self.downloader.fetch_resource(&url).await {
            Ok(fetched) => fetched,
            Err(e) => return Outcome::failed(&url, kind, e.to_string()),
        };

        let nested = self
            .expand(fetched.text(), fetched.url.clone(), depth + 1)
            .await;

        let mut body = format!("/* Imported from: {url} */\n{}\n", nested.css);
        let media = media.trim();
        if !media.is_empty() && !media.eq_ignore_ascii_case("all") {
            body = format!("@media {media} {{\n{body}}}\n");
        }

        Outcome {
            replacement: Some(body),
            successes: nested.successes + 1,
            failures: nested.failures,
        }
    }

    async fn inline_url(&self, target: &str, base: &Url) -> Outcome {
        if is_data_uri(target) {
            return Outcome::untouched();
        }
        let Some(url) = resolve_url(base, target) else {
            return Outcome::untouched();
        };

        let kind = classify(Some(MarkupContext::CssUrl), Some(&url), None);
        if !kind.is_media() {
            return Outcome::untouched();
        }
        let fetched = if kind == ResourceKind::Image {
            self.downloader.fetch_image(&url).await
        } else {
            self.downloader.fetch_resource(&url).await
        };

        match fetched {
            Ok(fetched) => {
                let mime = resolve_mime(fetched.content_type.as_deref(), &url);
                let data_uri = encode_data_uri(&mime, &fetched.body);
                log::debug!("Inlined {kind} {url} ({} bytes)", fetched.body.len());
                Outcome {
                    replacement: Some(format!("url(\"{data_uri}\")")),
                    successes: 1,
                    failures: Vec::new(),
                }
            }
            Err(e) => Outcome::failed(&url, kind, e.to_string()),
        }
    }
}

/// Whether an import condition can be expressed by wrapping in `@media`
fn can_splice(media: &str) -> bool {
    let lower = media.to_ascii_lowercase();
    !lower.contains("layer") && !lower.contains("supports(")
}

/// Locate every `@import` rule and `url()` function outside comments and strings
#[must_use]
pub fn scan_references(css: &str) -> Vec<CssReference> {
    let bytes = css.as_bytes();
    let mut references = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
            }
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
            }
            b'@' if starts_with_ignore_case(bytes, i, "@import")
                && !bytes.get(i + 7).copied().is_some_and(is_ident_byte) =>
            {
                match parse_import(css, i) {
                    Some((reference, end)) => {
                        references.push(reference);
                        i = end;
                    }
                    None => i += 7,
                }
            }
            b'u' | b'U'
                if starts_with_ignore_case(bytes, i, "url(")
                    && (i == 0 || !is_ident_byte(bytes[i - 1])) =>
            {
                match parse_url_function(css, i) {
                    Some((target, end)) => {
                        references.push(CssReference::Url {
                            span: i..end,
                            target,
                        });
                        i = end;
                    }
                    None => i += 4,
                }
            }
            _ => i += 1,
        }
    }

    references
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80
}

fn starts_with_ignore_case(bytes: &[u8], at: usize, needle: &str) -> bool {
    bytes
        .get(at..at + needle.len())
        .is_some_and(|slice| slice.eq_ignore_ascii_case(needle.as_bytes()))
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Index just past the string starting at `start`; unterminated strings end
/// at the newline like CSS bad-strings do
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Parse a quoted string at `start`, returning its unescaped value and the
/// index past the closing quote
fn parse_string(css: &str, start: usize) -> Option<(String, usize)> {
    let bytes = css.as_bytes();
    let end = skip_string(bytes, start);
    if end == 0 || end > bytes.len() || bytes.get(end - 1) != Some(&bytes[start]) || end - start < 2
    {
        return None;
    }
    let raw = &css[start + 1..end - 1];
    Some((unescape(raw), end))
}

fn unescape(raw: &str) -> String {
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next()
                && next != '\n'
            {
                value.push(next);
            }
        } else {
            value.push(c);
        }
    }
    value
}

/// Parse `url(...)` at `start`, returning the target and the index past `)`
fn parse_url_function(css: &str, start: usize) -> Option<(String, usize)> {
    let bytes = css.as_bytes();
    let mut i = skip_whitespace(bytes, start + 4);

    if matches!(bytes.get(i), Some(b'"' | b'\'')) {
        let (target, after) = parse_string(css, i)?;
        i = skip_whitespace(bytes, after);
        return (bytes.get(i) == Some(&b')')).then_some((target, i + 1));
    }

    let value_start = i;
    while i < bytes.len() {
        match bytes[i] {
            b')' => {
                let target = css[value_start..i].trim_end().to_string();
                return Some((target, i + 1));
            }
            b'"' | b'\'' | b'(' => return None,
            b if b.is_ascii_whitespace() => {
                let target = css[value_start..i].to_string();
                let close = skip_whitespace(bytes, i);
                return (bytes.get(close) == Some(&b')')).then_some((target, close + 1));
            }
            b'\\' => i += 2,
            _ => i += 1,
        }
    }
    None
}

/// Parse an `@import` rule at `start`
fn parse_import(css: &str, start: usize) -> Option<(CssReference, usize)> {
    let bytes = css.as_bytes();
    let i = skip_whitespace(bytes, start + 7);

    let (target, after_target) = if matches!(bytes.get(i), Some(b'"' | b'\'')) {
        parse_string(css, i)?
    } else if starts_with_ignore_case(bytes, i, "url(") {
        parse_url_function(css, i)?
    } else {
        return None;
    };

    let mut j = after_target;
    while j < bytes.len() {
        match bytes[j] {
            b';' => break,
            b'{' | b'}' => return None,
            b'"' | b'\'' => j = skip_string(bytes, j),
            _ => j += 1,
        }
    }

    let media = css[after_target..j.min(bytes.len())].trim().to_string();
    let end = (j + 1).min(bytes.len());
    Some((
        CssReference::Import {
            span: start..end,
            target,
            media,
        },
        end,
    ))
}
