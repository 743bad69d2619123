//! Archive naming, provenance and persistence

mod html_saver;
mod provenance;

pub use html_saver::{
    FILENAME_TIMESTAMP_FORMAT, archive_filename, archive_title, extract_title, save_archive,
};
pub use provenance::{ArchiveMetadata, banner_html};
