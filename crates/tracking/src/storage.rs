//! Secure local storage for small secrets
//!
//! [`EncryptedFileStorage`] seals the payload with AES-256-GCM and replaces
//! the file atomically (temp file, fsync, rename), so a crash mid-write
//! leaves either the old or the new blob on disk.

use crate::error::{Result, TrackingError};
use shopverse_crypto::{open, seal, SealingKey};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Opaque persisted blob
pub trait SecureStorage: Send + Sync {
    /// Read the stored plaintext, `None` when nothing is stored
    fn get(&self) -> Result<Option<Vec<u8>>>;
    /// Replace the stored plaintext
    fn save(&self, plaintext: &[u8]) -> Result<()>;
    /// Remove the stored plaintext; clearing an empty store succeeds
    fn clear(&self) -> Result<()>;
}

/// Sealed single-file store
#[derive(Debug)]
pub struct EncryptedFileStorage {
    path: PathBuf,
    key: SealingKey,
    associated_data: Vec<u8>,
}

impl EncryptedFileStorage {
    /// Store sealed data at `path`, binding it to `associated_data`
    pub fn new(path: impl Into<PathBuf>, key: SealingKey, associated_data: &[u8]) -> Self {
        Self {
            path: path.into(),
            key,
            associated_data: associated_data.to_vec(),
        }
    }

    /// Location of the sealed file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SecureStorage for EncryptedFileStorage {
    fn get(&self) -> Result<Option<Vec<u8>>> {
        let sealed = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match open(&self.key, &self.associated_data, &sealed) {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(e) if e.is_corruption() => Err(TrackingError::CorruptedStore(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, plaintext: &[u8]) -> Result<()> {
        let sealed = seal(&self.key, &self.associated_data, plaintext)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(fs::Permissions::from_mode(0o600))?;
            }
            file.write_all(&sealed)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        debug!(path = %self.path.display(), bytes = sealed.len(), "Sealed store written");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Sealed store cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<Option<Vec<u8>>>,
}

impl MemoryStorage {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecureStorage for MemoryStorage {
    fn get(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.slot().clone())
    }

    fn save(&self, plaintext: &[u8]) -> Result<()> {
        *self.slot() = Some(plaintext.to_vec());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> EncryptedFileStorage {
        EncryptedFileStorage::new(
            dir.path().join("credentials.sealed"),
            SealingKey::from_bytes([7; 32]),
            b"credentials",
        )
    }

    #[test]
    fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store(&dir).get().unwrap(), None);
        store(&dir).clear().unwrap();
    }

    #[test]
    fn test_save_then_get() {
        let dir = TempDir::new().unwrap();
        let storage = store(&dir);
        storage.save(b"hello").unwrap();

        assert_eq!(storage.get().unwrap().as_deref(), Some(&b"hello"[..]));
        assert!(!fs::read(storage.path()).unwrap().windows(5).any(|w| w == b"hello"));
        assert!(!storage.temp_path().exists());
    }

    #[test]
    fn test_overwrite_and_clear() {
        let dir = TempDir::new().unwrap();
        let storage = store(&dir);
        storage.save(b"first").unwrap();
        storage.save(b"second").unwrap();
        assert_eq!(storage.get().unwrap().as_deref(), Some(&b"second"[..]));

        storage.clear().unwrap();
        assert_eq!(storage.get().unwrap(), None);
    }

    #[test]
    fn test_tampered_file_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let storage = store(&dir);
        storage.save(b"payload").unwrap();

        let mut bytes = fs::read(storage.path()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(storage.path(), bytes).unwrap();

        assert!(matches!(storage.get(), Err(TrackingError::CorruptedStore(_))));
    }

    #[test]
    fn test_wrong_key_is_corrupted() {
        let dir = TempDir::new().unwrap();
        store(&dir).save(b"payload").unwrap();

        let other = EncryptedFileStorage::new(
            dir.path().join("credentials.sealed"),
            SealingKey::from_bytes([8; 32]),
            b"credentials",
        );
        assert!(matches!(other.get(), Err(TrackingError::CorruptedStore(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = store(&dir);
        storage.save(b"payload").unwrap();
        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        storage.save(b"x").unwrap();
        assert_eq!(storage.get().unwrap(), Some(b"x".to_vec()));
        storage.clear().unwrap();
        assert_eq!(storage.get().unwrap(), None);
    }
}
