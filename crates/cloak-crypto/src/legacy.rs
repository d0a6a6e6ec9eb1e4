//! Legacy direct-key generation
//!
//! Content was sealed directly under a key derived from the account secret
//! and the header's salt. There is no file key and nothing to share. Kept so
//! that content written before the key hierarchy changed stays readable, and
//! for write paths that must stay backward compatible.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::aead;
use crate::envelope::{self, Header, ALG_AES_256_GCM};
use crate::error::Result;
use crate::kdf::{derive_from_secret, LEGACY_CONTENT_CONTEXT};
use crate::names::extension_hint;
use crate::secret::AccountSecret;
use crate::{IV_SIZE, SALT_SIZE};

/// `{alg, salt, iv, ext}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyHeader {
    pub alg: String,
    #[serde(with = "crate::envelope::b64")]
    pub salt: [u8; SALT_SIZE],
    #[serde(with = "crate::envelope::b64")]
    pub iv: [u8; IV_SIZE],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
}

/// Seal `plaintext` as a legacy-generation envelope.
pub fn encrypt_legacy(
    plaintext: &[u8],
    secret: &AccountSecret,
    filename: Option<&str>,
) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let content_key = derive_from_secret(secret, &salt, LEGACY_CONTENT_CONTEXT)?;
    let sealed = aead::encrypt(&content_key, plaintext)?;

    let header = Header::Legacy(LegacyHeader {
        alg: ALG_AES_256_GCM.to_string(),
        salt,
        iv: sealed.iv,
        ext: filename.and_then(extension_hint),
    });
    tracing::debug!(bytes = plaintext.len(), "sealed legacy envelope");
    envelope::encode(&header, &sealed.ciphertext)
}

/// Open legacy ciphertext. A tag failure surfaces as
/// [`crate::CryptoError::Authentication`].
pub(crate) fn decrypt_legacy(
    header: &LegacyHeader,
    ciphertext: &[u8],
    secret: &AccountSecret,
) -> Result<Vec<u8>> {
    let content_key = derive_from_secret(secret, &header.salt, LEGACY_CONTENT_CONTEXT)?;
    Ok(aead::decrypt(&content_key, &header.iv, ciphertext)?)
}
