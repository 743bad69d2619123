//! Type definitions for resource inlining

use url::Url;

/// Classification of a reference, deciding how it is inlined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Stylesheet,
    Script,
    Image,
    Font,
    Other,
}

impl ResourceKind {
    /// Kinds a CSS `url()` may be inlined as
    #[must_use]
    pub fn is_media(self) -> bool {
        matches!(self, ResourceKind::Image | ResourceKind::Font)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Stylesheet => write!(f, "Stylesheet"),
            ResourceKind::Script => write!(f, "Script"),
            ResourceKind::Image => write!(f, "Image"),
            ResourceKind::Font => write!(f, "Font"),
            ResourceKind::Other => write!(f, "Other"),
        }
    }
}

/// Where in the markup a reference was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkupContext {
    /// `<link rel="stylesheet" href>`
    StylesheetLink,
    /// `<script src>`
    ScriptSrc,
    /// `<img src>`
    ImgSrc,
    /// Quoted image path inside script text
    ScriptLiteral,
    /// `@import` rule in a stylesheet
    CssImport,
    /// `url()` in a stylesheet or `style` attribute
    CssUrl,
}

/// A single reference located in a document
///
/// `resolved` is `None` when the raw text could not be turned into a
/// fetchable URL; such a reference is never inlined and its text is kept
/// verbatim. `inlined` is only set once the content has been fetched and
/// encoded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub raw: String,
    pub resolved: Option<Url>,
    pub kind: ResourceKind,
    pub context: MarkupContext,
    pub inlined: Option<String>,
}

impl ResourceRef {
    #[must_use]
    pub fn new(raw: impl Into<String>, resolved: Option<Url>, context: MarkupContext) -> Self {
        let raw = raw.into();
        let kind = super::classifier::classify(Some(context), resolved.as_ref(), None);
        Self {
            raw,
            resolved,
            kind,
            context,
            inlined: None,
        }
    }

    #[must_use]
    pub fn is_inlined(&self) -> bool {
        self.inlined.is_some()
    }
}

/// Error information for a failed sub-resource
#[derive(Debug, Clone)]
pub struct InliningError {
    pub url: String,
    pub kind: ResourceKind,
    pub error: String,
}

/// Result of resource inlining with success and failure tracking
#[derive(Debug, Clone)]
pub struct InliningResult {
    pub html: String,
    pub successes: usize,
    pub failures: Vec<InliningError>,
}

impl InliningResult {
    /// Total number of resources processed
    #[must_use]
    pub fn total(&self) -> usize {
        self.successes + self.failures.len()
    }

    /// Check if any failures occurred
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_has_no_failures() {
        let result = InliningResult {
            html: String::new(),
            successes: 0,
            failures: Vec::new(),
        };
        assert_eq!(result.total(), 0);
        assert!(!result.has_failures());
    }

    #[test]
    fn total_counts_failures() {
        let result = InliningResult {
            html: String::new(),
            successes: 3,
            failures: vec![InliningError {
                url: "https://example.com/missing.png".into(),
                kind: ResourceKind::Image,
                error: "HTTP 404".into(),
            }],
        };
        assert!(result.has_failures());
        assert_eq!(result.total(), 4);
    }

    #[test]
    fn unresolved_reference_is_not_inlined() {
        let reference = ResourceRef::new("data:image/png;base64,AA", None, MarkupContext::ImgSrc);
        assert_eq!(reference.kind, ResourceKind::Image);
        assert!(!reference.is_inlined());
    }
}
