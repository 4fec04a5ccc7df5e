use checkin_core::model::{ClassSession, SessionKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::repository::StorageError;

/// One notification from a session watch: the new document, `None` once it is
/// deleted, or a stream-level error.
pub type SessionChange = Result<Option<ClassSession>, StorageError>;

/// Sending half of a session watch, held by the feed backend.
pub type SessionChangeSender = mpsc::UnboundedSender<SessionChange>;

/// Receiving half of a session watch. Dropping it unregisters the watcher.
#[derive(Debug)]
pub struct SessionWatch {
    key: SessionKey,
    rx: mpsc::UnboundedReceiver<SessionChange>,
}

impl SessionWatch {
    /// A watch on `key` together with the sender a feed backend pushes to.
    #[must_use]
    pub fn channel(key: SessionKey) -> (SessionChangeSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { key, rx })
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Next change, or `None` once the store stops the feed.
    pub async fn next(&mut self) -> Option<SessionChange> {
        self.rx.recv().await
    }
}

/// In-process fan-out of session writes to watchers.
#[derive(Clone, Default)]
pub struct FeedHub {
    watchers: Arc<Mutex<HashMap<SessionKey, Vec<SessionChangeSender>>>>,
}

impl FeedHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watcher for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the watcher table is poisoned.
    pub fn watch(&self, key: &SessionKey) -> Result<SessionWatch, StorageError> {
        let (tx, watch) = SessionWatch::channel(key.clone());
        let mut guard = self
            .watchers
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.entry(key.clone()).or_default().push(tx);
        Ok(watch)
    }

    /// Deliver a snapshot to every live watcher of `key`, pruning dropped ones.
    pub fn publish(&self, key: &SessionKey, snapshot: Option<&ClassSession>) {
        let Ok(mut guard) = self.watchers.lock() else {
            tracing::warn!(session = %key, "session feed table poisoned; dropping change");
            return;
        };
        let Some(senders) = guard.get_mut(key) else {
            return;
        };
        senders.retain(|tx| tx.send(Ok(snapshot.cloned())).is_ok());
        if senders.is_empty() {
            guard.remove(key);
        }
    }

    /// Number of live watchers for `key`.
    #[must_use]
    pub fn watcher_count(&self, key: &SessionKey) -> usize {
        self.watchers
            .lock()
            .map(|guard| {
                guard
                    .get(key)
                    .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            })
            .unwrap_or(0)
    }
}
