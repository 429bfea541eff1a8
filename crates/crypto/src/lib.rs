//! Cryptographic utilities for ShopVerse.
//!
//! This crate provides:
//! - AES-256-GCM sealing with per-message nonces and associated data
//! - Sealing key generation, fingerprints and owner-only key files
//!
//! # Example
//!
//! ```
//! use shopverse_crypto::{open, seal, SealingKey};
//!
//! let key = SealingKey::generate();
//! let sealed = seal(&key, b"credentials", b"token").unwrap();
//! assert_eq!(open(&key, b"credentials", &sealed).unwrap(), b"token");
//! ```

#![warn(missing_docs)]

mod error;
mod key;
mod sealing;

pub use error::{CryptoError, CryptoErrorCode, Result};
pub use key::{SealingKey, KEY_LEN};
pub use sealing::{open, seal};
