//! The archive session
//!
//! [`Archiver`] owns everything jobs share: configuration, one HTTP client,
//! the event bus and the clock. Each call to [`Archiver::archive`] runs one
//! job: fetch the page, inline its resources, write the archive.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use url::Url;

use super::errors::ArchiveError;
use super::job::{ArchiveRequest, ArchiveResult, JobReport, JobState, JobTracker};
use crate::archive_events::{ArchiveEvent, ArchiveEventBus};
use crate::config::ArchiveConfig;
use crate::content_saver::{
    ArchiveMetadata, archive_filename, archive_title, banner_html, save_archive,
};
use crate::inline_css::{InliningError, ResourceDownloader, build_client, inline_all_resources};
use crate::registry::ArchiveRegistry;
use crate::utils::parse_page_url;

/// Source of archive timestamps
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Document built in memory, ready to be written
struct Assembled {
    source_url: Url,
    title: String,
    document: String,
    inlined: usize,
    failures: Vec<InliningError>,
}

/// Runs archive jobs for one project
#[derive(Clone)]
pub struct Archiver {
    config: Arc<ArchiveConfig>,
    client: Client,
    events: ArchiveEventBus,
    clock: Clock,
}

impl std::fmt::Debug for Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archiver")
            .field("config", &self.config)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl Archiver {
    /// Create an archiver with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns the client construction error (TLS backend initialisation).
    pub fn new(config: ArchiveConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(&config)?;
        Ok(Self::with_client(config, client))
    }

    /// Create an archiver sharing an existing HTTP client
    #[must_use]
    pub fn with_client(config: ArchiveConfig, client: Client) -> Self {
        let events = ArchiveEventBus::new(config.event_capacity());
        Self {
            config: Arc::new(config),
            client,
            events,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used for archive timestamps
    #[must_use]
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    #[must_use]
    pub fn events(&self) -> &ArchiveEventBus {
        &self.events
    }

    /// Registry over this archiver's sites directory, sharing its event bus
    #[must_use]
    pub fn registry(&self) -> ArchiveRegistry {
        ArchiveRegistry::from_config(&self.config, self.events.clone())
    }

    /// Archive one page
    ///
    /// # Errors
    ///
    /// [`ArchiveError::InvalidUrl`], [`ArchiveError::Fetch`] for the page
    /// itself, or [`ArchiveError::Write`]. Sub-resource failures never fail
    /// the job.
    pub async fn archive(&self, request: &ArchiveRequest) -> Result<ArchiveResult, ArchiveError> {
        self.run_job(request, std::future::pending()).await.result
    }

    /// Archive one page unless `cancel` completes first
    ///
    /// Cancellation is honoured until the document is assembled; once
    /// writing starts the job runs to completion.
    ///
    /// # Errors
    ///
    /// As [`Archiver::archive`], plus [`ArchiveError::Cancelled`].
    pub async fn archive_until<C>(
        &self,
        request: &ArchiveRequest,
        cancel: C,
    ) -> Result<ArchiveResult, ArchiveError>
    where
        C: Future<Output = ()>,
    {
        self.run_job(request, async {
            cancel.await;
            ArchiveError::Cancelled
        })
        .await
        .result
    }

    /// Archive one page within `deadline`
    ///
    /// # Errors
    ///
    /// As [`Archiver::archive`], plus [`ArchiveError::DeadlineExceeded`].
    pub async fn archive_with_deadline(
        &self,
        request: &ArchiveRequest,
        deadline: Duration,
    ) -> Result<ArchiveResult, ArchiveError> {
        self.run_job(request, async move {
            tokio::time::sleep(deadline).await;
            ArchiveError::DeadlineExceeded(deadline)
        })
        .await
        .result
    }

    /// Run a job and report its full history
    ///
    /// `abort` resolves to the error to fail with; it is only raced against
    /// fetching and inlining.
    pub async fn run_job<A>(&self, request: &ArchiveRequest, abort: A) -> JobReport
    where
        A: Future<Output = ArchiveError>,
    {
        let mut job = JobTracker::new(&request.source_url);

        let url = match parse_page_url(&request.source_url) {
            Ok(url) => url,
            Err(reason) => {
                let error = ArchiveError::InvalidUrl {
                    url: request.source_url.clone(),
                    reason,
                };
                return self.failed(job, &request.source_url, error, 0, Vec::new());
            }
        };

        let archived_at = (self.clock)();
        let downloader = ResourceDownloader::new(
            self.client.clone(),
            *self.config.budget(),
            self.config.dedupe_fetches(),
        );

        let assembled = tokio::select! {
            assembled = self.assemble(&mut job, &url, &downloader, archived_at) => assembled,
            error = abort => Err(error),
        };
        let assembled = match assembled {
            Ok(assembled) => assembled,
            Err(error) => return self.failed(job, url.as_str(), error, 0, Vec::new()),
        };

        job.advance(JobState::Writing);
        let filename = archive_filename(&assembled.title, &assembled.source_url, archived_at);
        let sites_path = self.config.sites_path();
        let saved = match save_archive(&sites_path, &filename, assembled.document).await {
            Ok(saved) => saved,
            Err(source) => {
                let error = ArchiveError::Write {
                    path: sites_path.join(&filename),
                    source,
                };
                return self.failed(
                    job,
                    assembled.source_url.as_str(),
                    error,
                    assembled.inlined,
                    assembled.failures,
                );
            }
        };
        job.advance(JobState::Done);

        // Differs from `filename` when the name was already taken
        let filename = saved
            .file_name()
            .map_or(filename, |name| name.to_string_lossy().into_owned());

        let result = ArchiveResult {
            title: assembled.title,
            path: format!("{}/{filename}", self.config.sites_dir().trim_end_matches('/')),
            archived_at,
            source_url: assembled.source_url.to_string(),
        };
        log::info!(
            "Archived {} as {} ({} resources inlined, {} skipped)",
            result.source_url,
            result.path,
            assembled.inlined,
            assembled.failures.len()
        );
        self.events.publish(ArchiveEvent::Created {
            source_url: result.source_url.clone(),
            title: result.title.clone(),
            path: result.path.clone(),
            timestamp: archived_at,
        });

        JobReport {
            history: job.history().to_vec(),
            result: Ok(result),
            inlined: assembled.inlined,
            resource_failures: assembled.failures,
        }
    }

    /// Fetch and inline, producing the final document in memory
    async fn assemble(
        &self,
        job: &mut JobTracker,
        url: &Url,
        downloader: &ResourceDownloader,
        archived_at: DateTime<Utc>,
    ) -> Result<Assembled, ArchiveError> {
        job.advance(JobState::Fetching);
        let page = downloader.fetch_page(url).await?;
        if &page.url != url {
            log::debug!("{url} redirected to {}", page.url);
        }
        let html = page.text();

        job.advance(JobState::Inlining);
        let title = archive_title(&html, &page.url);
        let banner = banner_html(page.url.as_str(), archived_at);
        let inlined = inline_all_resources(
            &html,
            &page.url,
            downloader,
            self.config.max_concurrent_fetches(),
            Some(banner),
        )
        .await;

        let metadata = ArchiveMetadata {
            source_url: page.url.to_string(),
            title: title.clone(),
            archived_at,
        };
        Ok(Assembled {
            document: format!("{}\n{}", metadata.to_comment(), inlined.html),
            source_url: page.url,
            title,
            inlined: inlined.successes,
            failures: inlined.failures,
        })
    }

    fn failed(
        &self,
        mut job: JobTracker,
        source_url: &str,
        error: ArchiveError,
        inlined: usize,
        resource_failures: Vec<InliningError>,
    ) -> JobReport {
        log::warn!("Archiving {source_url} failed in {} state: {error}", job.state());
        job.fail();
        self.events.publish(ArchiveEvent::Failed {
            source_url: source_url.to_string(),
            error: error.to_string(),
            timestamp: (self.clock)(),
        });
        JobReport {
            history: job.history().to_vec(),
            result: Err(error),
            inlined,
            resource_failures,
        }
    }
}
