//! Job-level errors

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::inline_css::FetchError;

/// Why an archive job ended without writing a file
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to fetch page: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to write archive {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive job cancelled")]
    Cancelled,

    #[error("Archive job exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

/// Coarse failure categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unparseable URL or disallowed scheme; nothing was fetched
    InvalidUrl,
    /// The page itself could not be fetched; nothing was written
    FetchFailure,
    /// The archive file could not be written
    WriteFailure,
    /// Cancelled or out of time before writing began
    Aborted,
}

impl ArchiveError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            ArchiveError::Fetch(_) => ErrorKind::FetchFailure,
            ArchiveError::Write { .. } => ErrorKind::WriteFailure,
            ArchiveError::Cancelled | ArchiveError::DeadlineExceeded(_) => ErrorKind::Aborted,
        }
    }
}
