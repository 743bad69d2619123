//! Reference discovery
//!
//! A read-only lol_html pass over the page that records, in document order,
//! every reference the pipeline may inline. Values are recorded exactly as
//! they appear in the markup; they double as lookup keys in the rewrite pass.

use std::cell::RefCell;
use std::sync::LazyLock;

use fancy_regex::Regex;
use lol_html::errors::RewritingError;
use lol_html::html_content::Element;
use lol_html::{HtmlRewriter, Settings, element, text};

use crate::utils::is_data_uri;

/// Quoted string literals ending in an image extension, e.g. `'img/logo.png'`
pub(crate) static IMAGE_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(['"])([^'"\n]*?\.(?:png|jpg|jpeg|gif|svg|webp))\1"#)
        .expect("IMAGE_LITERAL: hardcoded regex is valid")
});

/// References found in one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentScan {
    /// First `<base href>` value
    pub base_href: Option<String>,
    pub stylesheets: Vec<String>,
    pub scripts: Vec<String>,
    pub images: Vec<String>,
    pub script_literals: Vec<String>,
    /// `style` attribute values containing `url(`
    pub style_attributes: Vec<String>,
    /// Text of every `<style>` element, by position
    pub style_blocks: Vec<String>,
}

impl DocumentScan {
    /// Whether nothing in the document needs fetching
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stylesheets.is_empty()
            && self.scripts.is_empty()
            && self.images.is_empty()
            && self.script_literals.is_empty()
            && self.style_attributes.is_empty()
            && self.style_blocks.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Whether a `<link>` loads a stylesheet the pipeline should inline
///
/// `rel` is a case-insensitive token list; alternate stylesheets are skipped
/// because inlining would make them apply unconditionally.
pub(crate) fn is_stylesheet_link(el: &Element) -> bool {
    let Some(rel) = el.get_attribute("rel") else {
        return false;
    };
    let mut stylesheet = false;
    for token in rel.split_ascii_whitespace() {
        if token.eq_ignore_ascii_case("alternate") {
            return false;
        }
        if token.eq_ignore_ascii_case("stylesheet") {
            stylesheet = true;
        }
    }
    stylesheet
}

/// Image literals in script text, skipping ones that are already data URIs
pub(crate) fn image_literals(script: &str) -> Vec<String> {
    let mut found = Vec::new();
    for caps in IMAGE_LITERAL.captures_iter(script) {
        let Ok(caps) = caps else {
            log::debug!("Stopped scanning script literals: backtrack limit reached");
            break;
        };
        if let Some(literal) = caps.get(2)
            && !is_data_uri(literal.as_str())
        {
            push_unique(&mut found, literal.as_str().to_string());
        }
    }
    found
}

/// Find every inlinable reference in `html`
///
/// # Errors
///
/// Returns the tokenizer error if lol_html cannot process the input.
pub fn scan_document(html: &str) -> Result<DocumentScan, RewritingError> {
    let scan = RefCell::new(DocumentScan::default());
    let style_text = RefCell::new(String::new());
    let script_text = RefCell::new(String::new());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("base[href]", |el| {
                    let mut scan = scan.borrow_mut();
                    if scan.base_href.is_none() {
                        scan.base_href = el.get_attribute("href");
                    }
                    Ok(())
                }),
                element!("link[href]", |el| {
                    if is_stylesheet_link(el)
                        && let Some(href) = el.get_attribute("href")
                        && !is_data_uri(&href)
                    {
                        push_unique(&mut scan.borrow_mut().stylesheets, href);
                    }
                    Ok(())
                }),
                element!("script[src]", |el| {
                    if let Some(src) = el.get_attribute("src")
                        && !is_data_uri(&src)
                    {
                        push_unique(&mut scan.borrow_mut().scripts, src);
                    }
                    Ok(())
                }),
                element!("img[src]", |el| {
                    if let Some(src) = el.get_attribute("src")
                        && !is_data_uri(&src)
                    {
                        push_unique(&mut scan.borrow_mut().images, src);
                    }
                    Ok(())
                }),
                element!("[style]", |el| {
                    if let Some(style) = el.get_attribute("style")
                        && style.to_ascii_lowercase().contains("url(")
                    {
                        push_unique(&mut scan.borrow_mut().style_attributes, style);
                    }
                    Ok(())
                }),
                text!("style", |t| {
                    let mut buffer = style_text.borrow_mut();
                    buffer.push_str(t.as_str());
                    if t.last_in_text_node() {
                        scan.borrow_mut().style_blocks.push(std::mem::take(&mut *buffer));
                    }
                    Ok(())
                }),
                text!("script:not([src])", |t| {
                    let mut buffer = script_text.borrow_mut();
                    buffer.push_str(t.as_str());
                    if t.last_in_text_node() {
                        let literals = image_literals(&buffer);
                        buffer.clear();
                        let mut scan = scan.borrow_mut();
                        for literal in literals {
                            push_unique(&mut scan.script_literals, literal);
                        }
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    rewriter.write(html.as_bytes())?;
    rewriter.end()?;

    Ok(scan.into_inner())
}
