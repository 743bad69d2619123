//! Archive registry
//!
//! Enumerates and deletes stored archives under a project's sites directory.
//! Entries are described from the provenance comment on each archive's first
//! line, falling back to what the filename encodes.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::archive_events::{ArchiveEvent, ArchiveEventBus};
use crate::config::ArchiveConfig;
use crate::content_saver::{ArchiveMetadata, FILENAME_TIMESTAMP_FORMAT};

/// Longest first line read when looking for provenance
const MAX_METADATA_LINE: u64 = 8 * 1024;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid archive filename: {0}")]
    InvalidFilename(String),

    #[error("Archive not found: {0}")]
    NotFound(String),

    #[error("Archive registry I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One stored archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub filename: String,
    pub title: String,
    /// Empty when the archive carries no provenance
    pub source_url: String,
    pub timestamp: DateTime<Utc>,
}

/// Lists and deletes archives in one sites directory
#[derive(Debug, Clone)]
pub struct ArchiveRegistry {
    sites_dir: PathBuf,
    events: ArchiveEventBus,
}

impl ArchiveRegistry {
    #[must_use]
    pub fn new(sites_dir: impl Into<PathBuf>, events: ArchiveEventBus) -> Self {
        Self {
            sites_dir: sites_dir.into(),
            events,
        }
    }

    #[must_use]
    pub fn from_config(config: &ArchiveConfig, events: ArchiveEventBus) -> Self {
        Self::new(config.sites_path(), events)
    }

    #[must_use]
    pub fn sites_dir(&self) -> &Path {
        &self.sites_dir
    }

    /// Every archive, newest first
    ///
    /// A missing sites directory is an empty registry. Files that are not
    /// `.html` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] if the directory cannot be read.
    pub async fn list(&self) -> Result<Vec<ArchiveEntry>, RegistryError> {
        let dir = self.sites_dir.clone();
        tokio::task::spawn_blocking(move || list_dir(&dir))
            .await
            .map_err(|e| std::io::Error::other(format!("registry listing task failed: {e}")))?
    }

    /// Remove an archive and announce it on the event bus
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidFilename`] for anything that is not a bare
    /// `.html` filename, [`RegistryError::NotFound`] if no such archive
    /// exists.
    pub async fn delete(&self, filename: &str) -> Result<(), RegistryError> {
        validate_filename(filename)?;
        let path = self.sites_dir.join(filename);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::NotFound(filename.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        log::info!("Deleted archive {filename}");
        self.events.publish(ArchiveEvent::Deleted {
            filename: filename.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

fn validate_filename(filename: &str) -> Result<(), RegistryError> {
    let invalid = filename.is_empty()
        || filename.contains(['/', '\\', '\0'])
        || filename.starts_with('.')
        || filename.contains("..")
        || !filename.ends_with(".html");
    if invalid {
        return Err(RegistryError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

fn list_dir(dir: &Path) -> Result<Vec<ArchiveEntry>, RegistryError> {
    let reader = match std::fs::read_dir(dir) {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for item in reader {
        let item = item?;
        if !item.file_type()?.is_file() {
            continue;
        }
        let Ok(filename) = item.file_name().into_string() else {
            continue;
        };
        if !filename.ends_with(".html") || filename.starts_with('.') {
            continue;
        }
        entries.push(describe(&item.path(), filename));
    }

    entries.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    Ok(entries)
}

fn describe(path: &Path, filename: String) -> ArchiveEntry {
    if let Some(metadata) = read_metadata(path) {
        return ArchiveEntry {
            filename,
            title: metadata.title,
            source_url: metadata.source_url,
            timestamp: metadata.archived_at,
        };
    }

    let (timestamp, title) = parse_filename(&filename);
    ArchiveEntry {
        filename,
        title,
        source_url: String::new(),
        timestamp,
    }
}

fn read_metadata(path: &Path) -> Option<ArchiveMetadata> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::warn!("Cannot read archive {}: {e}", path.display());
            return None;
        }
    };
    let mut line = String::new();
    BufReader::new(file.take(MAX_METADATA_LINE))
        .read_line(&mut line)
        .ok()?;
    ArchiveMetadata::from_comment(&line)
}

/// Timestamp and a readable title recovered from an archive filename
///
/// Names that do not start with a timestamp get the Unix epoch so they sort
/// last.
fn parse_filename(filename: &str) -> (DateTime<Utc>, String) {
    let stem = filename.strip_suffix(".html").unwrap_or(filename);
    let stamp_len = "YYYY_MM_DD_HHMMSS".len();

    let parsed = stem
        .get(..stamp_len)
        .and_then(|stamp| NaiveDateTime::parse_from_str(stamp, FILENAME_TIMESTAMP_FORMAT).ok())
        .map(|naive| naive.and_utc());

    match parsed {
        Some(timestamp) => {
            let rest = stem[stamp_len..].trim_start_matches('_');
            let title = rest.rsplit_once('-').map_or(rest, |(title, _host)| title);
            (timestamp, title.replace('_', " "))
        }
        None => (DateTime::UNIX_EPOCH, stem.to_string()),
    }
}
