//! AES-256-GCM sealing.
//!
//! Layout of a sealed blob: `version (1) || nonce (12) || ciphertext || tag (16)`.
//! The associated data binds a blob to its purpose, so a sealed credential
//! cannot be replayed as some other record even under the same key.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};

use crate::{CryptoError, Result, SealingKey};

const VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

/// Encrypt and authenticate `plaintext` under `key`.
///
/// A fresh random nonce is drawn for every call.
pub fn seal(key: &SealingKey, associated_data: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )
        .map_err(|_| CryptoError::Sealing)?;

    let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    sealed.push(VERSION);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Verify and decrypt a blob produced by [`seal`].
pub fn open(key: &SealingKey, associated_data: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < HEADER_LEN + TAG_LEN {
        return Err(CryptoError::Truncated { len: sealed.len() });
    }
    if sealed[0] != VERSION {
        return Err(CryptoError::UnsupportedVersion(sealed[0]));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let nonce = Nonce::from_slice(&sealed[1..HEADER_LEN]);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &sealed[HEADER_LEN..],
                aad: associated_data,
            },
        )
        .map_err(|_| CryptoError::Opening)
}
