//! Archive job bookkeeping
//!
//! ```text
//! Pending → Fetching → Inlining → Writing → Done
//!     └─────────┴──────────┴─────────┴────→ Failed
//! ```

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ArchiveError;
use crate::inline_css::InliningError;

/// A URL to archive, optionally tied to the text it was found in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub source_url: String,
    /// Byte span of the trigger token in the originating text
    pub span: Option<Range<usize>>,
}

impl ArchiveRequest {
    #[must_use]
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            span: None,
        }
    }

    #[must_use]
    pub fn with_span(source_url: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            source_url: source_url.into(),
            span: Some(span),
        }
    }
}

/// A written archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveResult {
    pub title: String,
    /// Path relative to the project root, always `/`-separated
    pub path: String,
    pub archived_at: DateTime<Utc>,
    /// Final page URL after redirects
    pub source_url: String,
}

impl ArchiveResult {
    /// Filename component of [`ArchiveResult::path`]
    #[must_use]
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Fetching,
    Inlining,
    Writing,
    Done,
    Failed,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    fn successor(self) -> Option<JobState> {
        match self {
            JobState::Pending => Some(JobState::Fetching),
            JobState::Fetching => Some(JobState::Inlining),
            JobState::Inlining => Some(JobState::Writing),
            JobState::Writing => Some(JobState::Done),
            JobState::Done | JobState::Failed => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Fetching => "fetching",
            JobState::Inlining => "inlining",
            JobState::Writing => "writing",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State of one job as it runs
#[derive(Debug, Clone)]
pub struct JobTracker {
    url: String,
    history: Vec<JobState>,
}

impl JobTracker {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            history: vec![JobState::Pending],
        }
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.history.last().copied().unwrap_or(JobState::Pending)
    }

    #[must_use]
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    /// Move to the next state in the happy path
    ///
    /// Returns `false`, leaving the state unchanged, if `next` is not the
    /// direct successor of the current state.
    pub fn advance(&mut self, next: JobState) -> bool {
        if self.state().successor() != Some(next) {
            log::debug!("Ignoring transition {} -> {next} for {}", self.state(), self.url);
            return false;
        }
        log::debug!("Job {}: {} -> {next}", self.url, self.state());
        self.history.push(next);
        true
    }

    /// Enter the terminal failure state from any non-terminal state
    pub fn fail(&mut self) {
        if !self.state().is_terminal() {
            log::debug!("Job {}: {} -> failed", self.url, self.state());
            self.history.push(JobState::Failed);
        }
    }
}

/// Everything known about a finished job
#[derive(Debug)]
pub struct JobReport {
    pub history: Vec<JobState>,
    pub result: Result<ArchiveResult, ArchiveError>,
    /// Sub-resources embedded successfully
    pub inlined: usize,
    /// Sub-resources left as references
    pub resource_failures: Vec<InliningError>,
}

impl JobReport {
    #[must_use]
    pub fn state(&self) -> JobState {
        self.history.last().copied().unwrap_or(JobState::Pending)
    }
}
