//! Persisted credential

use crate::error::{Result, TrackingError};
use crate::model::Credential;
use crate::storage::SecureStorage;
use std::sync::Arc;

/// Reads and writes the [`Credential`] through a [`SecureStorage`]
///
/// Only the session manager writes through it.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn SecureStorage>,
}

impl TokenStore {
    /// Wrap a storage backend
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Load the stored credential
    ///
    /// Fails with [`TrackingError::CorruptedStore`] when the blob cannot be
    /// decrypted or decoded.
    pub fn get(&self) -> Result<Option<Credential>> {
        let Some(bytes) = self.storage.get()? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| TrackingError::CorruptedStore(format!("undecodable credential: {e}")))
    }

    /// Replace the stored credential
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let bytes = serde_json::to_vec(credential)
            .map_err(|e| TrackingError::CorruptedStore(format!("unencodable credential: {e}")))?;
        self.storage.save(&bytes)
    }

    /// Forget the stored credential
    pub fn clear(&self) -> Result<()> {
        self.storage.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::{TimeZone, Utc};

    fn credential() -> Credential {
        Credential {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_save_get_clear() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        assert!(store.get().unwrap().is_none());

        store.save(&credential()).unwrap();
        assert_eq!(store.get().unwrap(), Some(credential()));

        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_corrupted() {
        let storage = Arc::new(MemoryStorage::new());
        storage.save(b"{not json").unwrap();
        let store = TokenStore::new(storage);
        assert!(matches!(store.get(), Err(TrackingError::CorruptedStore(_))));
    }
}
