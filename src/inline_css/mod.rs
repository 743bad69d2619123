//! Resource inlining functionality
//!
//! Turns a fetched page into a self-contained document: stylesheets, scripts,
//! images, fonts and nested CSS references are downloaded and embedded
//! inline so the result renders without network access.

pub mod classifier;
pub mod css_processor;
pub mod downloaders;
pub mod orchestrator;
pub mod processors;
pub mod types;
pub mod utils;

pub use classifier::{classify, encode_data_uri, resolve_mime};
pub use css_processor::{CssExpansion, CssProcessor};
pub use downloaders::{FetchError, Fetched, ResourceDownloader, build_client};
pub use orchestrator::inline_all_resources;
pub use processors::{DocumentScan, scan_document};
pub use types::{InliningError, InliningResult, MarkupContext, ResourceKind, ResourceRef};
