//! Core configuration types for archiving
//!
//! This module contains the main `ArchiveConfig` struct and the
//! `DownloadBudget` limits that bound every network operation of a job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_CSS_DEPTH, DEFAULT_MAX_IMAGE_BYTES,
    DEFAULT_MAX_PAGE_BYTES, DEFAULT_MAX_RESOURCE_BYTES, DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Size, time and recursion limits applied to a single archive job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadBudget {
    /// Cap for stylesheets, scripts and fonts
    pub max_resource_bytes: usize,
    /// Cap for images
    pub max_image_bytes: usize,
    /// Cap for the top-level page body
    pub max_page_bytes: usize,
    /// Per-request timeout covering connect, headers and body
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// TCP connect timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    /// `@import` nesting followed before rules are left untouched
    pub max_css_depth: usize,
}

impl Default for DownloadBudget {
    fn default() -> Self {
        Self {
            max_resource_bytes: DEFAULT_MAX_RESOURCE_BYTES,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_css_depth: DEFAULT_MAX_CSS_DEPTH,
        }
    }
}

/// Main configuration struct for archive jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Project root that archives are stored beneath.
    ///
    /// **INVARIANT:** Always an absolute path (normalized in builder).
    pub(crate) project_root: PathBuf,
    /// Archive directory relative to `project_root`, `/`-separated
    pub(crate) sites_dir: String,
    pub(crate) budget: DownloadBudget,
    pub(crate) user_agent: String,
    /// Sub-resource downloads allowed in flight per job
    pub(crate) max_concurrent_fetches: usize,
    /// Download each distinct sub-resource URL at most once per job
    pub(crate) dedupe_fetches: bool,
    pub(crate) event_capacity: usize,
}

impl ArchiveConfig {
    #[must_use]
    pub fn project_root(&self) -> &std::path::Path {
        &self.project_root
    }

    /// Archive directory relative to the project root, as used in links
    #[must_use]
    pub fn sites_dir(&self) -> &str {
        &self.sites_dir
    }

    /// Absolute archive directory on disk
    #[must_use]
    pub fn sites_path(&self) -> PathBuf {
        self.sites_dir
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.project_root.clone(), |path, segment| path.join(segment))
    }

    #[must_use]
    pub fn budget(&self) -> &DownloadBudget {
        &self.budget
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches
    }

    #[must_use]
    pub fn dedupe_fetches(&self) -> bool {
        self.dedupe_fetches
    }

    #[must_use]
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
