pub mod archive_engine;
pub mod archive_events;
pub mod config;
pub mod content_saver;
pub mod inline_css;
pub mod registry;
pub mod utils;

pub use archive_engine::{
    ArchiveError, ArchiveRequest, ArchiveResult, Archiver, ErrorKind, JobReport, JobState,
    LinkProcessingReport, process_archive_links,
};
pub use archive_events::{ArchiveEvent, ArchiveEventBus};
pub use config::{ArchiveConfig, ArchiveConfigBuilder, ConfigError, DownloadBudget};
pub use content_saver::ArchiveMetadata;
pub use inline_css::{FetchError, InliningError, InliningResult, ResourceKind};
pub use registry::{ArchiveEntry, ArchiveRegistry, RegistryError};

/// Archive a single page with a one-off [`Archiver`]
///
/// # Errors
///
/// Returns the job's [`ArchiveError`]; failing to build the HTTP client is
/// reported as a transport failure of the page fetch.
pub async fn archive(config: ArchiveConfig, url: &str) -> Result<ArchiveResult, ArchiveError> {
    let archiver = Archiver::new(config).map_err(|e| {
        ArchiveError::Fetch(FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })
    })?;
    archiver.archive(&ArchiveRequest::new(url)).await
}
