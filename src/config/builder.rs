//! Type-safe builder for `ArchiveConfig` using the typestate pattern
//!
//! `build()` only exists once the project root has been supplied, so a
//! config without a storage location cannot be constructed.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::types::{ArchiveConfig, DownloadBudget};
use crate::utils::{
    CHROME_USER_AGENT, DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_CONCURRENT_FETCHES, SITES_SUBDIR,
};

/// Invalid builder input
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Project root cannot be empty")]
    EmptyProjectRoot,

    #[error("Failed to determine current directory: {0}")]
    CurrentDir(#[from] std::io::Error),

    #[error("Invalid sites directory '{0}': must be a relative path without '..'")]
    InvalidSitesDir(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

// Type states for the builder
pub struct WithProjectRoot;

pub struct ArchiveConfigBuilder<State = ()> {
    pub(crate) project_root: Option<PathBuf>,
    pub(crate) sites_dir: String,
    pub(crate) budget: DownloadBudget,
    pub(crate) user_agent: String,
    pub(crate) max_concurrent_fetches: usize,
    pub(crate) dedupe_fetches: bool,
    pub(crate) event_capacity: usize,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for ArchiveConfigBuilder<()> {
    fn default() -> Self {
        Self {
            project_root: None,
            sites_dir: SITES_SUBDIR.to_string(),
            budget: DownloadBudget::default(),
            user_agent: CHROME_USER_AGENT.to_string(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            dedupe_fetches: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            _phantom: PhantomData,
        }
    }
}

impl ArchiveConfig {
    /// Start building a configuration
    #[must_use]
    pub fn builder() -> ArchiveConfigBuilder<()> {
        ArchiveConfigBuilder::default()
    }
}

impl<State> ArchiveConfigBuilder<State> {
    fn transition<Next>(self) -> ArchiveConfigBuilder<Next> {
        ArchiveConfigBuilder {
            project_root: self.project_root,
            sites_dir: self.sites_dir,
            budget: self.budget,
            user_agent: self.user_agent,
            max_concurrent_fetches: self.max_concurrent_fetches,
            dedupe_fetches: self.dedupe_fetches,
            event_capacity: self.event_capacity,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn sites_dir(mut self, dir: impl Into<String>) -> Self {
        self.sites_dir = dir.into();
        self
    }

    #[must_use]
    pub fn budget(mut self, budget: DownloadBudget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn max_resource_bytes(mut self, bytes: usize) -> Self {
        self.budget.max_resource_bytes = bytes;
        self
    }

    #[must_use]
    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.budget.max_image_bytes = bytes;
        self
    }

    #[must_use]
    pub fn max_page_bytes(mut self, bytes: usize) -> Self {
        self.budget.max_page_bytes = bytes;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.budget.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.budget.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_css_depth(mut self, depth: usize) -> Self {
        self.budget.max_css_depth = depth;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit;
        self
    }

    #[must_use]
    pub fn dedupe_fetches(mut self, enabled: bool) -> Self {
        self.dedupe_fetches = enabled;
        self
    }

    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl ArchiveConfigBuilder<()> {
    /// Set the project root archives are stored beneath
    #[must_use]
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> ArchiveConfigBuilder<WithProjectRoot> {
        self.project_root = Some(root.into());
        self.transition()
    }
}

impl ArchiveConfigBuilder<WithProjectRoot> {
    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the project root is empty, the sites directory
    /// escapes the root, or a limit is zero.
    pub fn build(self) -> Result<ArchiveConfig, ConfigError> {
        let root = self.project_root.unwrap_or_default();
        if root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyProjectRoot);
        }
        let project_root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(root)
        };

        let sites_dir = self.sites_dir.trim_matches('/').to_string();
        if sites_dir.is_empty()
            || sites_dir.split('/').any(|segment| segment == ".." || segment.contains('\\'))
        {
            return Err(ConfigError::InvalidSitesDir(self.sites_dir));
        }

        let budget = self.budget;
        for (field, value) in [
            ("max_resource_bytes", budget.max_resource_bytes),
            ("max_image_bytes", budget.max_image_bytes),
            ("max_page_bytes", budget.max_page_bytes),
            ("max_concurrent_fetches", self.max_concurrent_fetches),
            ("event_capacity", self.event_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if budget.request_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "request_timeout",
            });
        }

        Ok(ArchiveConfig {
            project_root,
            sites_dir,
            budget,
            user_agent: self.user_agent,
            max_concurrent_fetches: self.max_concurrent_fetches,
            dedupe_fetches: self.dedupe_fetches,
            event_capacity: self.event_capacity,
        })
    }
}
