//! Sealing key generation and key file management.

use aes_gcm::{
    aead::{KeyInit, OsRng},
    Aes256Gcm,
};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::{CryptoError, Result};

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

/// A 256-bit AES-GCM key.
#[derive(Clone, PartialEq, Eq)]
pub struct SealingKey([u8; KEY_LEN]);

impl SealingKey {
    /// Generates a new random key from the operating system RNG.
    pub fn generate() -> Self {
        let generated = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&generated);
        Self(bytes)
    }

    /// Wraps existing key material.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a hex-encoded key.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let raw = hex::decode(encoded.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = raw.try_into().map_err(|raw: Vec<u8>| {
            CryptoError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", raw.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Short, non-secret identifier for logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..8])
    }

    /// Loads the key stored at `path`, creating one if the file is missing.
    ///
    /// New key files are written atomically with owner-only permissions.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let key = Self::from_hex(&content)?;
                tracing::debug!(path = %path.display(), fingerprint = %key.fingerprint(), "Loaded sealing key");
                Ok(key)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let key = Self::generate();
                key.write_to(path)?;
                tracing::info!(path = %path.display(), fingerprint = %key.fingerprint(), "Generated new sealing key");
                Ok(key)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("tmp");
        {
            let mut file = open_private(&tmp)?;
            file.write_all(hex::encode(self.0).as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SealingKey").field(&self.fingerprint()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(SealingKey::generate(), SealingKey::generate());
    }

    #[test]
    fn test_hex_parsing() {
        let key = SealingKey::from_bytes([7u8; KEY_LEN]);
        let parsed = SealingKey::from_hex(&format!("{}\n", hex::encode([7u8; KEY_LEN]))).unwrap();
        assert_eq!(parsed, key);

        assert!(matches!(SealingKey::from_hex("abcd"), Err(CryptoError::InvalidKey(_))));
        assert!(matches!(SealingKey::from_hex("zz"), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let key = SealingKey::from_bytes([0xab; KEY_LEN]);
        let debug = format!("{key:?}");
        assert!(!debug.contains(&hex::encode([0xab; KEY_LEN])));
        assert!(debug.contains(&key.fingerprint()));
    }

    #[test]
    fn test_load_or_create_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("master.key");

        let created = SealingKey::load_or_create(&path).unwrap();
        let loaded = SealingKey::load_or_create(&path).unwrap();

        assert_eq!(created, loaded);
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        SealingKey::load_or_create(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        fs::write(&path, "not hex").unwrap();

        assert!(matches!(
            SealingKey::load_or_create(&path),
            Err(CryptoError::InvalidKey(_))
        ));
    }
}
