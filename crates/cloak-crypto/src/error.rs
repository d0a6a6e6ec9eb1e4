//! Error types for the engine.
//!
//! Expected data conditions (no envelope, wrong key, tampering) are ordinary
//! return values of [`crate::decrypt`]. [`CryptoError`] is reserved for caller
//! contract violations and primitive failures, plus two rejection variants the
//! decryption strategies match on internally.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("secret must be exactly 32 bytes, got {0}")]
    InvalidSecretLength(usize),

    #[error("invalid account secret encoding: {0}")]
    SecretEncoding(String),

    #[error("HKDF expand failed: {0}")]
    Kdf(String),

    #[error("Argon2id KDF failed: {0}")]
    Argon2(String),

    #[error("AES-256-GCM encryption failed")]
    Encryption,

    /// Authenticated decryption did not succeed (wrong key or tampered data).
    #[error(transparent)]
    Authentication(#[from] AuthenticationFailed),

    /// A wrapped file key could not be opened with the given account secret.
    /// Wrong secret and corrupted record are deliberately indistinguishable.
    #[error("wrapped file key rejected: wrong account secret or corrupted record")]
    KeyRejected,

    #[error("malformed wrapped file key: {0}")]
    MalformedWrappedKey(String),

    #[error("header serialization failed: {0}")]
    Header(#[from] serde_json::Error),

    #[error("header of {0} bytes does not fit the u32 length field")]
    HeaderTooLarge(usize),

    #[error("invalid recovery phrase: {0}")]
    Mnemonic(String),
}

/// The AEAD tag did not verify. No partial plaintext is ever produced.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("authenticated decryption failed")]
pub struct AuthenticationFailed;

/// The magic matched a known generation but the container is broken.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope truncated: {len} bytes, fixed prefix needs {needed}")]
    Truncated { len: usize, needed: usize },

    #[error("header length {header_len} exceeds the {available} bytes after the prefix")]
    HeaderOverrun { header_len: usize, available: usize },

    #[error("header is not valid JSON for this generation: {0}")]
    Header(String),

    #[error("unsupported content algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("invalid share token: {0}")]
    InvalidShareToken(String),
}
