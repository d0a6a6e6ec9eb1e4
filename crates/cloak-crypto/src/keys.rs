//! Per-file keys and their wrapping under account-derived KEKs
//!
//! WrappedFileKey record (binary, 77 bytes):
//! ```text
//! [1 byte: version=0x01][16 bytes: KEK salt][12 bytes: IV][32 bytes: key ciphertext][16 bytes: tag]
//! ```
//! Its text form is standard base64 of the record. The record is file
//! metadata, stored alongside the envelope rather than inside it.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::aead;
use crate::error::{CryptoError, Result};
use crate::kdf::{derive_from_secret, KEK_CONTEXT};
use crate::secret::AccountSecret;
use crate::{IV_SIZE, KEY_SIZE, SALT_SIZE, TAG_SIZE};

/// A per-file 256-bit content key. Zeroized on drop.
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A file key recovered by its owner through [`unwrap`].
///
/// Only this type can be exported as a share token, so exporting always
/// implies the caller held the account secret that wrapped the key.
#[derive(Debug)]
pub struct OwnedFileKey(FileKey);

impl std::ops::Deref for OwnedFileKey {
    type Target = FileKey;

    fn deref(&self) -> &FileKey {
        &self.0
    }
}

/// Generate a random 256-bit file encryption key.
pub fn generate_file_key() -> FileKey {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    rand::thread_rng().fill_bytes(&mut bytes[..]);
    FileKey::from_bytes(*bytes)
}

/// A file key encrypted under a KEK derived from the owner's account secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WrappedFileKey {
    salt: [u8; SALT_SIZE],
    iv: [u8; IV_SIZE],
    ciphertext: [u8; KEY_SIZE + TAG_SIZE],
}

impl WrappedFileKey {
    pub const VERSION: u8 = 1;
    pub const LEN: usize = 1 + SALT_SIZE + IV_SIZE + KEY_SIZE + TAG_SIZE;

    /// The KEK salt; envelopes reference their wrapped key by it.
    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.push(Self::VERSION);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(CryptoError::MalformedWrappedKey(format!(
                "expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        if bytes[0] != Self::VERSION {
            return Err(CryptoError::MalformedWrappedKey(format!(
                "unsupported record version {}",
                bytes[0]
            )));
        }

        let (salt, rest) = bytes[1..].split_at(SALT_SIZE);
        let (iv, ciphertext) = rest.split_at(IV_SIZE);

        let mut record = Self {
            salt: [0u8; SALT_SIZE],
            iv: [0u8; IV_SIZE],
            ciphertext: [0u8; KEY_SIZE + TAG_SIZE],
        };
        record.salt.copy_from_slice(salt);
        record.iv.copy_from_slice(iv);
        record.ciphertext.copy_from_slice(ciphertext);
        Ok(record)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s.trim())
            .map_err(|e| CryptoError::MalformedWrappedKey(format!("base64 decode: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for WrappedFileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for WrappedFileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedFileKey")
            .field("version", &Self::VERSION)
            .field("salt", &STANDARD.encode(self.salt))
            .finish_non_exhaustive()
    }
}

impl FromStr for WrappedFileKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base64(s)
    }
}

impl TryFrom<String> for WrappedFileKey {
    type Error = CryptoError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_base64(&s)
    }
}

impl From<WrappedFileKey> for String {
    fn from(wrapped: WrappedFileKey) -> Self {
        wrapped.to_base64()
    }
}

/// Wrap (encrypt) a file key under a KEK derived from the account secret.
///
/// A fresh salt is drawn for every wrap, so wrapping the same key twice
/// yields unrelated records.
pub fn wrap(file_key: &FileKey, secret: &AccountSecret) -> Result<WrappedFileKey> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let kek = derive_from_secret(secret, &salt, KEK_CONTEXT)?;
    let sealed = aead::encrypt(&kek, file_key.as_bytes())?;

    let mut ciphertext = [0u8; KEY_SIZE + TAG_SIZE];
    if sealed.ciphertext.len() != ciphertext.len() {
        return Err(CryptoError::Encryption);
    }
    ciphertext.copy_from_slice(&sealed.ciphertext);

    Ok(WrappedFileKey {
        salt,
        iv: sealed.iv,
        ciphertext,
    })
}

/// Unwrap (decrypt) a file key with the owner's account secret.
///
/// Fails with [`CryptoError::KeyRejected`] for a wrong secret or a corrupted
/// record alike.
pub fn unwrap(wrapped: &WrappedFileKey, secret: &AccountSecret) -> Result<OwnedFileKey> {
    let kek = derive_from_secret(secret, &wrapped.salt, KEK_CONTEXT)?;

    let plaintext = Zeroizing::new(
        aead::decrypt(&kek, &wrapped.iv, &wrapped.ciphertext)
            .map_err(|_| CryptoError::KeyRejected)?,
    );

    if plaintext.len() != KEY_SIZE {
        return Err(CryptoError::KeyRejected);
    }

    let mut key_bytes = Zeroizing::new([0u8; KEY_SIZE]);
    key_bytes.copy_from_slice(&plaintext);

    Ok(OwnedFileKey(FileKey::from_bytes(*key_bytes)))
}
