//! URL resolution utilities.
//!
//! Every reference found in markup or stylesheets goes through [`resolve_url`]
//! before anything is fetched. A `None` result means "leave the reference as
//! it is", never a failure of the surrounding job.

use url::Url;

/// Resolve a potentially relative reference against a base URL
///
/// Accepts absolute `http(s)://` URLs, protocol-relative `//host/...`
/// references and path-relative references. Returns `None` for empty
/// references, fragment-only references (`#id`, used by SVG filters), any
/// non-fetchable scheme (`data:`, `mailto:`, `tel:`, `javascript:`, `blob:`...)
/// and anything the URL parser rejects.
#[must_use]
pub fn resolve_url(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    if has_scheme(reference) && !is_http_scheme(reference) {
        return None;
    }

    match base.join(reference) {
        Ok(resolved) if matches!(resolved.scheme(), "http" | "https") => Some(resolved),
        Ok(resolved) => {
            log::debug!("Refusing non-http reference {reference} (resolved to {resolved})");
            None
        }
        Err(e) => {
            log::debug!("Failed to resolve '{reference}' against {base}: {e}");
            None
        }
    }
}

/// Parse the URL of a page to archive
///
/// Only absolute `http` and `https` URLs with a host are accepted.
pub fn parse_page_url(raw: &str) -> Result<Url, String> {
    let parsed = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", parsed.scheme()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err("URL has no host".to_string());
    }
    Ok(parsed)
}

/// Check whether a reference is already an embedded `data:` URI
#[must_use]
pub fn is_data_uri(reference: &str) -> bool {
    reference
        .trim_start()
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}

/// Lowercased file extension of the URL path, without the dot
///
/// Query strings and fragments are ignored, so `a.PNG?v=3` yields `png`.
#[must_use]
pub fn path_extension(url: &Url) -> Option<String> {
    extension_of(url.path())
}

fn extension_of(path: &str) -> Option<String> {
    let last_segment = path.rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// A scheme is an ASCII letter followed by letters, digits, `+`, `-` or `.`,
/// terminated by `:` before any `/`, `?` or `#`.
fn has_scheme(reference: &str) -> bool {
    let Some(colon) = reference.find(':') else {
        return false;
    };
    let scheme = &reference[..colon];
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn is_http_scheme(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
