//! Change notifications for collaborators that cache directory listings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// Capacity of the event channel.
const EVENT_CAPACITY: usize = 64;

/// Something changed on disk that listing/caching layers should re-scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LibraryEvent {
    /// Contents of a directory changed (files repacked, archived or renamed).
    DirectoryChanged { path: PathBuf },
}

impl LibraryEvent {
    pub fn directory_changed(path: impl AsRef<Path>) -> Self {
        Self::DirectoryChanged {
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Create a sender for library events plus an initial receiver.
pub fn channel() -> (broadcast::Sender<LibraryEvent>, broadcast::Receiver<LibraryEvent>) {
    broadcast::channel(EVENT_CAPACITY)
}

/// Fire-and-forget broadcast; having no subscribers is not an error.
pub(crate) fn notify(tx: Option<&broadcast::Sender<LibraryEvent>>, event: LibraryEvent) {
    if let Some(tx) = tx {
        if tx.send(event).is_err() {
            tracing::debug!("No subscribers for library event");
        }
    }
}
