//! Archive jobs: fetch a page, inline it, write it
//!
//! [`Archiver`] is the session object callers keep around; trigger-token
//! processing for user text is built on top of it in [`links`].

pub mod archiver;
pub mod errors;
pub mod job;
pub mod links;

pub use archiver::{Archiver, Clock};
pub use errors::{ArchiveError, ErrorKind};
pub use job::{ArchiveRequest, ArchiveResult, JobReport, JobState, JobTracker};
pub use links::{
    LinkProcessingReport, find_trigger_tokens, process_archive_links, substitution_text,
};
