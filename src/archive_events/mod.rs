//! Archive lifecycle events
//!
//! The bus is how collaborators learn about archives being created or
//! deleted; the note store strikes through references on `Deleted`.

pub mod bus;
pub mod types;

pub use bus::ArchiveEventBus;
pub use types::ArchiveEvent;
