//! Configuration for archive jobs
//!
//! `ArchiveConfig` is built through a typestate builder that requires the
//! project root before `build()` becomes available.

pub mod builder;
pub mod types;

pub use builder::{ArchiveConfigBuilder, ConfigError, WithProjectRoot};
pub use types::{ArchiveConfig, DownloadBudget};
