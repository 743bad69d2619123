//! Broadcast bus for archive events

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::types::ArchiveEvent;

/// Fan-out of [`ArchiveEvent`]s to any number of subscribers
///
/// Cloning yields a handle to the same channel. Events published while
/// nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct ArchiveEventBus {
    sender: broadcast::Sender<ArchiveEvent>,
    published: Arc<AtomicU64>,
}

impl ArchiveEventBus {
    /// Create a bus buffering up to `capacity` events per slow subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: ArchiveEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                log::trace!("No subscribers for {event:?}");
                0
            }
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ArchiveEvent> {
        self.sender.subscribe()
    }

    /// Total events published since creation, delivered or not
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
