//! Resource classification and data URI encoding
//!
//! Kind is decided from markup context first, then the file extension, then
//! the response `Content-Type`.

use base64::Engine;
use url::Url;

use super::types::{MarkupContext, ResourceKind};
use crate::utils::path_extension;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp"];
const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];

const FALLBACK_MIME: &str = "application/octet-stream";

/// Classify a reference
///
/// `context` wins when it pins the kind (a `<script src>` is a script no
/// matter its extension). CSS `url()` references carry no kind of their own
/// and fall through to the extension, then to `content_type`.
#[must_use]
pub fn classify(
    context: Option<MarkupContext>,
    url: Option<&Url>,
    content_type: Option<&str>,
) -> ResourceKind {
    if let Some(kind) = context.and_then(kind_from_context) {
        return kind;
    }
    if let Some(kind) = url
        .and_then(path_extension)
        .and_then(|ext| kind_from_extension(&ext))
    {
        return kind;
    }
    content_type
        .map(kind_from_content_type)
        .unwrap_or(ResourceKind::Other)
}

fn kind_from_context(context: MarkupContext) -> Option<ResourceKind> {
    match context {
        MarkupContext::StylesheetLink | MarkupContext::CssImport => Some(ResourceKind::Stylesheet),
        MarkupContext::ScriptSrc => Some(ResourceKind::Script),
        MarkupContext::ImgSrc | MarkupContext::ScriptLiteral => Some(ResourceKind::Image),
        MarkupContext::CssUrl => None,
    }
}

/// Kind implied by a lowercased file extension
#[must_use]
pub fn kind_from_extension(ext: &str) -> Option<ResourceKind> {
    match ext {
        "css" => Some(ResourceKind::Stylesheet),
        "js" | "mjs" => Some(ResourceKind::Script),
        e if IMAGE_EXTENSIONS.contains(&e) => Some(ResourceKind::Image),
        e if FONT_EXTENSIONS.contains(&e) => Some(ResourceKind::Font),
        _ => None,
    }
}

fn kind_from_content_type(content_type: &str) -> ResourceKind {
    let essence = mime_essence(content_type);
    match essence.as_str() {
        "text/css" => ResourceKind::Stylesheet,
        "text/javascript" | "application/javascript" | "application/x-javascript" => {
            ResourceKind::Script
        }
        e if e.starts_with("image/") => ResourceKind::Image,
        e if e.starts_with("font/")
            || e == "application/font-woff"
            || e == "application/vnd.ms-fontobject"
            || e == "application/x-font-ttf" =>
        {
            ResourceKind::Font
        }
        _ => ResourceKind::Other,
    }
}

/// `type/subtype` part of a Content-Type header, lowercased
#[must_use]
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Fallback MIME type for an extension
#[must_use]
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        _ => return None,
    };
    Some(mime)
}

/// MIME type used in a data URI
///
/// The response header wins when it is present and well-formed, then the
/// extension table, then `application/octet-stream`. Parameters such as
/// `charset` are dropped so the URI never contains spaces or quotes.
#[must_use]
pub fn resolve_mime(content_type: Option<&str>, url: &Url) -> String {
    if let Some(essence) = content_type.map(mime_essence)
        && is_well_formed_mime(&essence)
    {
        return essence;
    }
    path_extension(url)
        .and_then(|ext| mime_for_extension(&ext))
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

fn is_well_formed_mime(essence: &str) -> bool {
    let Some((top, sub)) = essence.split_once('/') else {
        return false;
    };
    let token = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | '_'))
    };
    token(top) && token(sub)
}

/// Encode bytes as a `data:<mime>;base64,<payload>` URI
#[must_use]
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    let encoded_capacity = base64::encoded_len(bytes.len(), true).unwrap_or(0);
    let mut encoded = String::with_capacity(encoded_capacity + 13 + mime.len());

    encoded.push_str("data:");
    encoded.push_str(mime);
    encoded.push_str(";base64,");

    base64::engine::general_purpose::STANDARD.encode_string(bytes, &mut encoded);

    encoded
}
