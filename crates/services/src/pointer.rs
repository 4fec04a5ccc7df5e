use std::sync::Arc;

use checkin_core::model::{RecoveryPointer, SessionKey};
use storage::repository::{LocalCache, StorageError};

/// Reads and writes the recovery pointer in the device-local cache.
#[derive(Clone)]
pub struct PointerStore {
    cache: Arc<dyn LocalCache>,
}

impl PointerStore {
    #[must_use]
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        Self { cache }
    }

    /// Load the pointer. Unparsable values are logged, discarded from the
    /// cache and treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read.
    pub async fn load(&self) -> Result<RecoveryPointer, StorageError> {
        let class_id = self.cache.get(RecoveryPointer::CLASS_KEY).await?;
        let checkin_no = self.cache.get(RecoveryPointer::CHECKIN_KEY).await?;
        match RecoveryPointer::from_raw(class_id.as_deref(), checkin_no.as_deref()) {
            Ok(pointer) => Ok(pointer),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable recovery pointer");
                if let Err(err) = self.clear().await {
                    tracing::warn!(error = %err, "failed to discard recovery pointer");
                }
                Ok(RecoveryPointer::default())
            }
        }
    }

    /// Remember `key` as the last active session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be written.
    pub async fn save(&self, key: &SessionKey) -> Result<(), StorageError> {
        self.cache
            .set(RecoveryPointer::CLASS_KEY, key.class_id.as_str())
            .await?;
        self.cache
            .set(RecoveryPointer::CHECKIN_KEY, &key.checkin_no.to_string())
            .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.cache.remove(RecoveryPointer::CLASS_KEY).await?;
        self.cache.remove(RecoveryPointer::CHECKIN_KEY).await
    }
}
