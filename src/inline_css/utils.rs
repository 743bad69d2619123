//! Rewrite pass applying inlined content to a document
//!
//! The page is parsed once more with lol_html and every handler looks its
//! element up in [`Replacements`] by the raw attribute value recorded during
//! discovery. Tags without a replacement are emitted byte-for-byte.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::LazyLock;

use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{HtmlRewriter, Settings, element, text};
use regex::Regex;
use url::Url;

use super::downloaders::charset_param;
use super::processors::{IMAGE_LITERAL, is_stylesheet_link};

static CLOSING_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(style)").expect("CLOSING_STYLE: hardcoded regex is valid")
});

static CLOSING_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(script)").expect("CLOSING_SCRIPT: hardcoded regex is valid")
});

/// Output is always UTF-8, so any other declared charset is stale
fn is_utf8_label(label: &str) -> bool {
    encoding_rs::Encoding::for_label(label.trim().as_bytes()) == Some(encoding_rs::UTF_8)
}

/// A fetched and expanded stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinedStylesheet {
    pub source: Url,
    pub css: String,
}

/// Everything the rewrite pass substitutes, keyed by raw markup value
#[derive(Debug, Clone, Default)]
pub struct Replacements {
    /// `<link href>` → stylesheet
    pub stylesheets: HashMap<String, InlinedStylesheet>,
    /// `<script src>` → script text
    pub scripts: HashMap<String, String>,
    /// `<img src>` → data URI
    pub images: HashMap<String, String>,
    /// Script string literal → data URI
    pub script_literals: HashMap<String, String>,
    /// `style` attribute value → rewritten declarations
    pub style_attributes: HashMap<String, String>,
    /// Rewritten text per `<style>` element position; `None` keeps the original
    pub style_blocks: Vec<Option<String>>,
    /// Markup inserted after the opening `<body>` tag
    pub banner: Option<String>,
}

/// Escape `</style` so inlined CSS cannot close its element early
#[must_use]
pub fn escape_style_text(css: &str) -> String {
    CLOSING_STYLE.replace_all(css, r"<\/$1").into_owned()
}

/// Escape `</script` so inlined JavaScript cannot close its element early
#[must_use]
pub fn escape_script_text(script: &str) -> String {
    CLOSING_SCRIPT.replace_all(script, r"<\/$1").into_owned()
}

/// Build the `<style>` block that replaces a stylesheet link
#[must_use]
pub fn style_block(sheet: &InlinedStylesheet, media: Option<&str>) -> String {
    let media_attr = media
        .map(|m| format!(" media=\"{}\"", html_escape::encode_double_quoted_attribute(m)))
        .unwrap_or_default();
    format!(
        "<style type=\"text/css\"{media_attr}>\n/* Inlined from: {} */\n{}\n</style>",
        sheet.source,
        escape_style_text(&sheet.css)
    )
}

/// Build the inline `<script>` that replaces an external one
#[must_use]
pub fn script_block(script: &str, script_type: Option<&str>) -> String {
    let type_attr = script_type
        .map(|t| format!(" type=\"{}\"", html_escape::encode_double_quoted_attribute(t)))
        .unwrap_or_default();
    format!("<script{type_attr}>\n{}\n</script>", escape_script_text(script))
}

/// Replace known image literals inside script text
fn rewrite_script_literals(script: &str, literals: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(script.len());
    let mut cursor = 0;
    for caps in IMAGE_LITERAL.captures_iter(script) {
        let Ok(caps) = caps else {
            break;
        };
        if let Some(literal) = caps.get(2)
            && let Some(data_uri) = literals.get(literal.as_str())
        {
            output.push_str(&script[cursor..literal.start()]);
            output.push_str(data_uri);
            cursor = literal.end();
        }
    }
    output.push_str(&script[cursor..]);
    output
}

/// Apply all replacements in a single rewrite pass
///
/// Returns the rewritten document and whether the banner found a `<body>`
/// to attach to.
///
/// # Errors
///
/// Returns the tokenizer error if lol_html cannot process the input.
pub fn apply_all_replacements(
    html: &str,
    replacements: &Replacements,
) -> Result<(String, bool), RewritingError> {
    let mut output = Vec::with_capacity(html.len());
    let banner_placed = Cell::new(false);
    let style_index = Cell::new(0usize);
    let script_text = RefCell::new(String::new());

    let mut handlers = vec![
        element!("link[href]", |el| {
            if is_stylesheet_link(el)
                && let Some(href) = el.get_attribute("href")
                && let Some(sheet) = replacements.stylesheets.get(&href)
            {
                let media = el.get_attribute("media");
                el.replace(&style_block(sheet, media.as_deref()), ContentType::Html);
            }
            Ok(())
        }),
        element!("script[src]", |el| {
            if let Some(src) = el.get_attribute("src")
                && let Some(script) = replacements.scripts.get(&src)
            {
                let script_type = el.get_attribute("type");
                el.replace(&script_block(script, script_type.as_deref()), ContentType::Html);
            }
            Ok(())
        }),
        element!("img[src]", |el| {
            if let Some(src) = el.get_attribute("src")
                && let Some(data_uri) = replacements.images.get(&src)
            {
                el.set_attribute("src", data_uri)?;
            }
            Ok(())
        }),
        element!("[style]", |el| {
            if let Some(style) = el.get_attribute("style")
                && let Some(rewritten) = replacements.style_attributes.get(&style)
            {
                let encoded = html_escape::encode_double_quoted_attribute(rewritten);
                el.set_attribute("style", &encoded)?;
            }
            Ok(())
        }),
        element!("meta[charset]", |el| {
            if el.get_attribute("charset").is_some_and(|label| !is_utf8_label(&label)) {
                el.set_attribute("charset", "utf-8")?;
            }
            Ok(())
        }),
        element!("meta[http-equiv][content]", |el| {
            let declares_type = el
                .get_attribute("http-equiv")
                .is_some_and(|name| name.trim().eq_ignore_ascii_case("content-type"));
            if declares_type
                && let Some(content) = el.get_attribute("content")
                && charset_param(&content).is_some_and(|label| !is_utf8_label(label))
            {
                el.set_attribute("content", "text/html; charset=utf-8")?;
            }
            Ok(())
        }),
        element!("body", |el| {
            if let Some(banner) = &replacements.banner
                && !banner_placed.get()
            {
                el.prepend(banner, ContentType::Html);
                banner_placed.set(true);
            }
            Ok(())
        }),
        text!("style", |t| {
            let index = style_index.get();
            let Some(Some(css)) = replacements.style_blocks.get(index) else {
                if t.last_in_text_node() {
                    style_index.set(index + 1);
                }
                return Ok(());
            };

            if t.last_in_text_node() {
                t.replace(&escape_style_text(css), ContentType::Html);
                style_index.set(index + 1);
            } else {
                t.remove();
            }
            Ok(())
        }),
    ];

    if !replacements.script_literals.is_empty() {
        handlers.push(text!("script:not([src])", |t| {
            let mut buffer = script_text.borrow_mut();
            buffer.push_str(t.as_str());
            if t.last_in_text_node() {
                let rewritten = rewrite_script_literals(&buffer, &replacements.script_literals);
                t.replace(&rewritten, ContentType::Html);
                buffer.clear();
            } else {
                t.remove();
            }
            Ok(())
        }));
    }

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter.write(html.as_bytes())?;
    rewriter.end()?;

    let html = String::from_utf8(output)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    Ok((html, banner_placed.get()))
}
