//! Error types for the crypto crate.

use thiserror::Error;

/// Result type alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during crypto operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material is malformed or has the wrong length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Encryption failed
    #[error("Sealing failed")]
    Sealing,

    /// Authentication tag did not verify (wrong key, tampering or corruption)
    #[error("Sealed data failed authentication")]
    Opening,

    /// Input shorter than a header plus tag
    #[error("Sealed data truncated: {len} bytes")]
    Truncated {
        /// Length of the rejected input
        len: usize,
    },

    /// Unknown format version byte
    #[error("Unsupported sealed data version: {0}")]
    UnsupportedVersion(u8),

    /// Reading or writing key material failed
    #[error("Key file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error code for integration with shopverse-core error handling.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorCode {
    /// Key problems
    InvalidKey = 9000,
    /// Encryption failure
    EncryptionFailed = 9001,
    /// Decryption or format failure
    DecryptionFailed = 9002,
    /// Filesystem failure
    Io = 2000,
}

impl CryptoError {
    /// Returns the error code for this error.
    pub fn code(&self) -> CryptoErrorCode {
        match self {
            CryptoError::InvalidKey(_) => CryptoErrorCode::InvalidKey,
            CryptoError::Sealing => CryptoErrorCode::EncryptionFailed,
            CryptoError::Opening | CryptoError::Truncated { .. } | CryptoError::UnsupportedVersion(_) => {
                CryptoErrorCode::DecryptionFailed
            }
            CryptoError::Io(_) => CryptoErrorCode::Io,
        }
    }

    /// Whether the error means stored data cannot be trusted or read
    pub fn is_corruption(&self) -> bool {
        self.code() == CryptoErrorCode::DecryptionFailed
    }
}
