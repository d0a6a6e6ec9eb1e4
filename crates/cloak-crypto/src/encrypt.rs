//! Current-generation write path: fresh file key, content sealed under it,
//! file key wrapped under the account secret.

use crate::aead;
use crate::envelope::{self, CurrentHeader, Header, ALG_AES_256_GCM};
use crate::error::Result;
use crate::keys::{generate_file_key, wrap, WrappedFileKey};
use crate::names::extension_hint;
use crate::secret::AccountSecret;

/// What the transport layer persists for one encrypted file.
#[derive(Debug, Clone)]
pub struct EncryptedFile {
    /// Bytes to upload.
    pub envelope: Vec<u8>,
    /// Metadata to store alongside the uploaded object.
    pub wrapped_key: WrappedFileKey,
}

/// Encrypt `plaintext` as a current-generation envelope.
///
/// `filename`, if given, contributes its extension as the header hint.
pub fn encrypt_file(
    plaintext: &[u8],
    secret: &AccountSecret,
    filename: Option<&str>,
) -> Result<EncryptedFile> {
    let file_key = generate_file_key();
    let wrapped_key = wrap(&file_key, secret)?;
    let ext = filename.and_then(extension_hint);

    // the header records the IV and is itself authenticated with the content
    let bound = aead::encrypt_bound(file_key.as_bytes(), plaintext, |iv| {
        envelope::encode_prefix(&Header::Current(CurrentHeader {
            alg: ALG_AES_256_GCM.to_string(),
            iv: *iv,
            key_ref: *wrapped_key.salt(),
            ext,
        }))
    })?;
    let mut envelope = bound.aad;
    envelope.extend_from_slice(&bound.sealed.ciphertext);

    tracing::debug!(
        bytes = plaintext.len(),
        envelope_bytes = envelope.len(),
        "sealed current envelope"
    );

    Ok(EncryptedFile {
        envelope,
        wrapped_key,
    })
}
