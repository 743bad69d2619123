//! Bounded HTTP downloads for pages and sub-resources
//!
//! ## Architecture
//!
//! [`ResourceDownloader`] performs exactly one GET per call:
//! - the request carries the budget's timeout (the client carries the
//!   connect timeout)
//! - a non-2xx status is a failure
//! - the body is streamed and the download aborts as soon as it would
//!   exceed the byte cap, so nothing beyond the cap is ever buffered
//!
//! Failures are returned as [`FetchError`] values. Sub-resource callers log
//! and skip them; the top-level page fetch turns them into a job failure.
//! Nothing is retried.
//!
//! When deduplication is enabled the downloader keeps a per-job cache so
//! identical URLs (a shared `@import`, a sprite used by many rules) are
//! fetched once.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use dashmap::DashMap;
use encoding_rs::{Encoding, UTF_8};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use regex::bytes::Regex;
use reqwest::Client;
use thiserror::Error;
use url::Url;

use super::classifier::mime_essence;
use crate::config::{ArchiveConfig, DownloadBudget};

/// Failure of a single download
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP error {status}: {url}")]
    Status { url: String, status: u16 },

    #[error("Resource exceeds {limit} byte limit: {url}")]
    TooLarge { url: String, limit: usize },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Download failed for {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    fn from_reqwest(url: &Url, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// URL the failed request was made to
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. }
            | FetchError::TooLarge { url, .. }
            | FetchError::Timeout { url }
            | FetchError::Transport { url, .. } => url,
        }
    }
}

/// A successfully downloaded body
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Fetched {
    /// Body decoded to UTF-8 using its declared charset
    ///
    /// A byte order mark wins, then the `Content-Type` charset, then an
    /// in-document declaration (`<meta charset>` for HTML, `@charset` for
    /// CSS), then UTF-8. Invalid sequences become U+FFFD.
    #[must_use]
    pub fn text(&self) -> String {
        let encoding = self.declared_encoding().unwrap_or(UTF_8);
        let (text, used, had_errors) = encoding.decode(&self.body);
        if had_errors {
            log::debug!("Replaced invalid {} sequences in {}", used.name(), self.url);
        }
        text.into_owned()
    }

    fn declared_encoding(&self) -> Option<&'static Encoding> {
        let content_type = self.content_type.as_deref().unwrap_or_default();
        if let Some(encoding) = charset_param(content_type).and_then(|label| {
            Encoding::for_label(label.as_bytes())
        }) {
            return Some(encoding);
        }

        let prefix = &self.body[..self.body.len().min(CHARSET_PRESCAN_BYTES)];
        let declaration = match mime_essence(content_type).as_str() {
            "text/css" => CSS_CHARSET.captures(prefix),
            "" | "text/html" | "application/xhtml+xml" => META_CHARSET.captures(prefix),
            _ => None,
        }?;
        // A document that claims UTF-16 in its own ASCII text is not UTF-16
        Encoding::for_label(declaration.get(1)?.as_bytes()).map(Encoding::output_encoding)
    }
}

/// Bytes searched for an in-document charset declaration
const CHARSET_PRESCAN_BYTES: usize = 1024;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)<meta\b[^>]*?charset\s*=\s*["']?\s*([A-Za-z0-9_:.\-]+)"#)
        .expect("META_CHARSET: hardcoded regex is valid")
});

static CSS_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\A@charset "([A-Za-z0-9_:.\-]+)";"#)
        .expect("CSS_CHARSET: hardcoded regex is valid")
});

/// `charset` parameter of a Content-Type header
pub(crate) fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|part| {
        let (name, value) = part.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
            .filter(|label| !label.is_empty())
    })
}

/// One shared download per `(url, byte cap)`; later callers await the same
/// future instead of issuing another request
type FetchCache = DashMap<(String, usize), Shared<BoxFuture<'static, Result<Arc<Fetched>, FetchError>>>>;

/// Build the HTTP client shared by all jobs of an archiver
///
/// # Errors
///
/// Returns the underlying error if the TLS backend fails to initialise.
pub fn build_client(config: &ArchiveConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent())
        .connect_timeout(config.budget().connect_timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// Downloader bound to one job's budget
#[derive(Debug, Clone)]
pub struct ResourceDownloader {
    client: Client,
    budget: DownloadBudget,
    cache: Option<Arc<FetchCache>>,
}

impl ResourceDownloader {
    #[must_use]
    pub fn new(client: Client, budget: DownloadBudget, dedupe: bool) -> Self {
        Self {
            client,
            budget,
            cache: dedupe.then(|| Arc::new(DashMap::new())),
        }
    }

    #[must_use]
    pub fn budget(&self) -> &DownloadBudget {
        &self.budget
    }

    /// Download the top-level page under the page cap
    ///
    /// # Errors
    ///
    /// Any [`FetchError`]; the caller treats it as job-fatal.
    pub async fn fetch_page(&self, url: &Url) -> Result<Fetched, FetchError> {
        fetch(
            &self.client,
            url,
            self.budget.max_page_bytes,
            self.budget.request_timeout,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .await
    }

    /// Download a stylesheet, script or font under the generic cap
    ///
    /// # Errors
    ///
    /// Any [`FetchError`]; callers leave the reference untouched.
    pub async fn fetch_resource(&self, url: &Url) -> Result<Arc<Fetched>, FetchError> {
        self.fetch_cached(url, self.budget.max_resource_bytes, "*/*")
            .await
    }

    /// Download an image under the image cap
    ///
    /// # Errors
    ///
    /// Any [`FetchError`]; callers leave the reference untouched.
    pub async fn fetch_image(&self, url: &Url) -> Result<Arc<Fetched>, FetchError> {
        self.fetch_cached(
            url,
            self.budget.max_image_bytes,
            "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8",
        )
        .await
    }

    async fn fetch_cached(
        &self,
        url: &Url,
        max_bytes: usize,
        accept: &'static str,
    ) -> Result<Arc<Fetched>, FetchError> {
        let Some(cache) = &self.cache else {
            return fetch(&self.client, url, max_bytes, self.budget.request_timeout, accept)
                .await
                .map(Arc::new);
        };

        // The entry guard is released before awaiting so other tasks can
        // join the same download
        let download = cache
            .entry((url.to_string(), max_bytes))
            .or_insert_with(|| {
                let client = self.client.clone();
                let url = url.clone();
                let timeout = self.budget.request_timeout;
                async move {
                    fetch(&client, &url, max_bytes, timeout, accept)
                        .await
                        .map(Arc::new)
                }
                .boxed()
                .shared()
            })
            .clone();

        if download.peek().is_some() {
            log::debug!("Reusing download of {url}");
        }
        download.await
    }
}

/// Core download implementation
///
/// Handles the single GET with timeout, status check and streaming size
/// enforcement.
async fn fetch(
    client: &Client,
    url: &Url,
    max_bytes: usize,
    timeout: Duration,
    accept: &str,
) -> Result<Fetched, FetchError> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .header(reqwest::header::ACCEPT, accept)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // Get expected size and enforce limit BEFORE downloading
    let expected_size = response.content_length().unwrap_or(0);
    if expected_size > max_bytes as u64 {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            limit: max_bytes,
        });
    }

    let mut buffer = Vec::with_capacity(expected_size as usize);
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| FetchError::from_reqwest(url, &e))?;

        // Check BEFORE accumulating
        if buffer.len() + chunk.len() > max_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: max_bytes,
            });
        }
        buffer.extend_from_slice(&chunk);
    }

    log::debug!("Downloaded {} bytes from {final_url}", buffer.len());

    Ok(Fetched {
        url: final_url,
        content_type,
        body: buffer,
    })
}
