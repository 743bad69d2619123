//! Shared configuration constants for the archiver
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Default cap for generic sub-resources (stylesheets, scripts, fonts): 5 MB
pub const DEFAULT_MAX_RESOURCE_BYTES: usize = 5 * 1024 * 1024;

/// Default cap for images: 1 MB
///
/// Anything larger bloats the archive by a third again once base64-encoded.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 1024 * 1024;

/// Default cap for the top-level page body: 10 MB
pub const DEFAULT_MAX_PAGE_BYTES: usize = 10 * 1024 * 1024;

/// Per-request timeout covering connect, headers and body
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum `@import` nesting followed by the CSS processor
pub const DEFAULT_MAX_CSS_DEPTH: usize = 5;

/// Sub-resource downloads allowed in flight per job
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Buffered events per subscriber before the oldest are dropped
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Archive directory relative to the project root
pub const SITES_SUBDIR: &str = "assets/sites";

/// Maximum characters kept per sanitized filename component
pub const MAX_FILENAME_COMPONENT_LEN: usize = 50;

/// Chrome user agent string
///
/// Some CDNs refuse or degrade responses for unknown clients, so requests
/// identify as a current desktop browser.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
