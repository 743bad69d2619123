//! Event type definitions for archive jobs and the registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events emitted by archive jobs and the archive registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveEvent {
    /// An archive file was written
    Created {
        source_url: String,
        title: String,
        path: String,
        timestamp: DateTime<Utc>,
    },
    /// A job ended without writing anything
    Failed {
        source_url: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// An archive was removed
    ///
    /// Note stores listen for this to strike through references to `filename`.
    Deleted {
        filename: String,
        timestamp: DateTime<Utc>,
    },
}

impl ArchiveEvent {
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ArchiveEvent::Created { timestamp, .. }
            | ArchiveEvent::Failed { timestamp, .. }
            | ArchiveEvent::Deleted { timestamp, .. } => *timestamp,
        }
    }
}
