//! Resource inlining orchestration
//!
//! Coordinates one document's inlining:
//! 1. discovery pass over the page ([`scan_document`])
//! 2. concurrent downloads per category, merged back in document order
//! 3. a single rewrite pass ([`apply_all_replacements`])
//!
//! A failed sub-resource is logged and recorded in the result, and its
//! reference stays as it was. Nothing here fails the job.

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;

use futures::join;
use futures::stream::{self, StreamExt};
use url::Url;

use super::classifier::{encode_data_uri, resolve_mime};
use super::css_processor::CssProcessor;
use super::downloaders::{FetchError, ResourceDownloader};
use super::processors::scan_document;
use super::types::{InliningError, InliningResult, MarkupContext, ResourceRef};
use super::utils::{InlinedStylesheet, Replacements, apply_all_replacements};
use crate::utils::resolve_url;

/// Outcome of inlining a single discovered reference
struct Inlined<T> {
    value: Option<T>,
    successes: usize,
    failures: Vec<InliningError>,
}

impl<T> Inlined<T> {
    fn skipped() -> Self {
        Self {
            value: None,
            successes: 0,
            failures: Vec::new(),
        }
    }

    fn failed(reference: &ResourceRef, error: &FetchError) -> Self {
        log::warn!(
            "Failed to inline {} '{}': {error}",
            reference.kind,
            reference.raw
        );
        Self {
            value: None,
            successes: 0,
            failures: vec![InliningError {
                url: error.url().to_string(),
                kind: reference.kind,
                error: error.to_string(),
            }],
        }
    }
}

impl Inlined<String> {
    /// Outcome carrying a reference's inlined content, if it has any
    fn from_reference(reference: ResourceRef) -> Self {
        Self {
            successes: usize::from(reference.is_inlined()),
            value: reference.inlined,
            failures: Vec::new(),
        }
    }
}

/// Per-document state shared by every download
struct DocumentJob<'a> {
    downloader: &'a ResourceDownloader,
    css: CssProcessor<'a>,
    base: Url,
}

impl DocumentJob<'_> {
    /// Attribute values are entity-decoded before resolving; script text is
    /// raw and used as written
    fn reference(&self, raw: &str, context: MarkupContext) -> ResourceRef {
        let target = match context {
            MarkupContext::ScriptLiteral => Cow::Borrowed(raw),
            _ => html_escape::decode_html_entities(raw),
        };
        ResourceRef::new(raw, resolve_url(&self.base, &target), context)
    }

    async fn stylesheet(&self, raw: String) -> Inlined<InlinedStylesheet> {
        let reference = self.reference(&raw, MarkupContext::StylesheetLink);
        let Some(url) = reference.resolved.clone() else {
            return Inlined::skipped();
        };
        let fetched = match self.downloader.fetch_resource(&url).await {
            Ok(fetched) => fetched,
            Err(e) => return Inlined::failed(&reference, &e),
        };

        let expansion = self
            .css
            .expand(fetched.text(), fetched.url.clone(), 0)
            .await;
        log::debug!("Inlined stylesheet {url} ({} bytes)", expansion.css.len());

        Inlined {
            value: Some(InlinedStylesheet {
                source: url,
                css: expansion.css,
            }),
            successes: expansion.successes + 1,
            failures: expansion.failures,
        }
    }

    async fn script(&self, raw: String) -> Inlined<String> {
        let mut reference = self.reference(&raw, MarkupContext::ScriptSrc);
        let Some(url) = reference.resolved.clone() else {
            return Inlined::skipped();
        };
        match self.downloader.fetch_resource(&url).await {
            Ok(fetched) => {
                log::debug!("Inlined script {url} ({} bytes)", fetched.body.len());
                reference.inlined = Some(fetched.text());
                Inlined::from_reference(reference)
            }
            Err(e) => Inlined::failed(&reference, &e),
        }
    }

    async fn image(&self, raw: String, context: MarkupContext) -> Inlined<String> {
        let mut reference = self.reference(&raw, context);
        let Some(url) = reference.resolved.clone() else {
            return Inlined::skipped();
        };
        match self.downloader.fetch_image(&url).await {
            Ok(fetched) => {
                let mime = resolve_mime(fetched.content_type.as_deref(), &url);
                log::debug!("Inlined image {url} as {mime} ({} bytes)", fetched.body.len());
                reference.inlined = Some(encode_data_uri(&mime, &fetched.body));
                Inlined::from_reference(reference)
            }
            Err(e) => Inlined::failed(&reference, &e),
        }
    }

    async fn style_attribute(&self, raw: String) -> Inlined<String> {
        let decoded = html_escape::decode_html_entities(&raw);
        let expansion = self.css.rewrite_urls(&decoded, &self.base).await;
        Inlined {
            value: (expansion.successes > 0).then_some(expansion.css),
            successes: expansion.successes,
            failures: expansion.failures,
        }
    }

    async fn style_block(&self, css: String) -> Inlined<String> {
        let expansion = self.css.expand(css, self.base.clone(), 0).await;
        Inlined {
            value: (expansion.successes > 0).then_some(expansion.css),
            successes: expansion.successes,
            failures: expansion.failures,
        }
    }
}

/// Run `inline` over `items` with at most `limit` in flight, keeping input order
async fn in_document_order<T, F, Fut>(
    items: Vec<String>,
    limit: usize,
    inline: F,
) -> Vec<(String, Inlined<T>)>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Inlined<T>>,
{
    let pending: Vec<_> = items
        .into_iter()
        .map(|raw| {
            let outcome = inline(raw.clone());
            async move { (raw, outcome.await) }
        })
        .collect();
    stream::iter(pending).buffered(limit.max(1)).collect().await
}

fn tally<T>(
    outcomes: Vec<(String, Inlined<T>)>,
    successes: &mut usize,
    failures: &mut Vec<InliningError>,
) -> Vec<(String, Option<T>)> {
    outcomes
        .into_iter()
        .map(|(raw, outcome)| {
            *successes += outcome.successes;
            failures.extend(outcome.failures);
            (raw, outcome.value)
        })
        .collect()
}

fn keyed<T>(entries: Vec<(String, Option<T>)>) -> HashMap<String, T> {
    entries
        .into_iter()
        .filter_map(|(raw, value)| value.map(|v| (raw, v)))
        .collect()
}

/// Insert the banner at the top of a document that has no `<body>` tag,
/// after a leading doctype if there is one
#[must_use]
pub fn prepend_banner(html: &str, banner: &str) -> String {
    let trimmed = html.trim_start();
    let offset = html.len() - trimmed.len();
    let doctype_end = trimmed
        .get(..9)
        .filter(|prefix| prefix.eq_ignore_ascii_case("<!doctype"))
        .and_then(|_| trimmed.find('>'))
        .map_or(0, |end| offset + end + 1);

    let mut out = String::with_capacity(html.len() + banner.len());
    out.push_str(&html[..doctype_end]);
    out.push_str(banner);
    out.push_str(&html[doctype_end..]);
    out
}

/// Inline every external resource of `html`
///
/// `page_url` is the final URL of the page; a `<base href>` in the document
/// overrides it for relative references. `banner`, when given, is inserted
/// right after the opening `<body>` tag.
pub async fn inline_all_resources(
    html: &str,
    page_url: &Url,
    downloader: &ResourceDownloader,
    max_concurrent: usize,
    banner: Option<String>,
) -> InliningResult {
    let scan = match scan_document(html) {
        Ok(scan) => scan,
        Err(e) => {
            log::warn!("Could not scan {page_url} for resources, archiving as fetched: {e}");
            let html = match &banner {
                Some(banner) => prepend_banner(html, banner),
                None => html.to_string(),
            };
            return InliningResult {
                html,
                successes: 0,
                failures: Vec::new(),
            };
        }
    };

    let base = scan
        .base_href
        .as_deref()
        .and_then(|href| resolve_url(page_url, &html_escape::decode_html_entities(href)))
        .unwrap_or_else(|| page_url.clone());
    if &base != page_url {
        log::debug!("Resolving references of {page_url} against <base> {base}");
    }

    let job = DocumentJob {
        downloader,
        css: CssProcessor::new(downloader, max_concurrent),
        base,
    };

    log::debug!(
        "Inlining {page_url}: {} stylesheets, {} scripts, {} images, {} script literals, \
         {} style attributes, {} style elements",
        scan.stylesheets.len(),
        scan.scripts.len(),
        scan.images.len(),
        scan.script_literals.len(),
        scan.style_attributes.len(),
        scan.style_blocks.len()
    );

    let job = &job;
    let (stylesheets, scripts, images, literals, attributes, blocks) = join!(
        in_document_order(scan.stylesheets, max_concurrent, move |raw| job.stylesheet(raw)),
        in_document_order(scan.scripts, max_concurrent, move |raw| job.script(raw)),
        in_document_order(scan.images, max_concurrent, move |raw| {
            job.image(raw, MarkupContext::ImgSrc)
        }),
        in_document_order(scan.script_literals, max_concurrent, move |raw| {
            job.image(raw, MarkupContext::ScriptLiteral)
        }),
        in_document_order(scan.style_attributes, max_concurrent, move |raw| {
            job.style_attribute(raw)
        }),
        in_document_order(scan.style_blocks, max_concurrent, move |css| job.style_block(css)),
    );

    let mut successes = 0;
    let mut failures = Vec::new();
    let replacements = Replacements {
        stylesheets: keyed(tally(stylesheets, &mut successes, &mut failures)),
        scripts: keyed(tally(scripts, &mut successes, &mut failures)),
        images: keyed(tally(images, &mut successes, &mut failures)),
        script_literals: keyed(tally(literals, &mut successes, &mut failures)),
        style_attributes: keyed(tally(attributes, &mut successes, &mut failures)),
        style_blocks: tally(blocks, &mut successes, &mut failures)
            .into_iter()
            .map(|(_, value)| value)
            .collect(),
        banner,
    };

    let html = match apply_all_replacements(html, &replacements) {
        Ok((rewritten, true)) => rewritten,
        Ok((rewritten, false)) => match &replacements.banner {
            Some(banner) => prepend_banner(&rewritten, banner),
            None => rewritten,
        },
        Err(e) => {
            log::warn!("Rewriting {page_url} failed, archiving as fetched: {e}");
            match &replacements.banner {
                Some(banner) => prepend_banner(html, banner),
                None => html.to_string(),
            }
        }
    };

    log::info!(
        "Inlined {successes} resources into {page_url} ({} failed)",
        failures.len()
    );

    InliningResult {
        html,
        successes,
        failures,
    }
}
