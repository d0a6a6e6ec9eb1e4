//! AES-256-GCM encryption/decryption
//!
//! Sealed format (binary, IV carried separately by the caller's header):
//! ```text
//! [N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The IV is always drawn here, per call, from the OS-seeded CSPRNG. There is
//! no encrypt entry point that accepts an IV. [`encrypt_bound`] hands the fresh
//! IV to a callback that builds the associated data (an envelope header that
//! itself records the IV), so header bytes are authenticated with the content.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::error::{AuthenticationFailed, CryptoError, Result};
use crate::{IV_SIZE, KEY_SIZE, TAG_SIZE};

/// Output of [`encrypt`]: the fresh IV and `ciphertext || tag`.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Output of [`encrypt_bound`]: the sealed content plus the associated data
/// that must accompany it at decrypt time.
#[derive(Debug, Clone)]
pub struct BoundSealed {
    pub aad: Vec<u8>,
    pub sealed: Sealed,
}

/// Encrypt `plaintext` under `key` with a freshly generated 96-bit IV.
pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Sealed> {
    let iv = fresh_iv();
    let ciphertext = seal(key, &iv, plaintext, &[])?;
    Ok(Sealed { iv, ciphertext })
}

/// Encrypt `plaintext` with a fresh IV, authenticating the associated data
/// that `bind` builds from that IV.
pub fn encrypt_bound<F>(key: &[u8; KEY_SIZE], plaintext: &[u8], bind: F) -> Result<BoundSealed>
where
    F: FnOnce(&[u8; IV_SIZE]) -> Result<Vec<u8>>,
{
    let iv = fresh_iv();
    let aad = bind(&iv)?;
    let ciphertext = seal(key, &iv, plaintext, &aad)?;
    Ok(BoundSealed {
        aad,
        sealed: Sealed { iv, ciphertext },
    })
}

fn fresh_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

fn seal(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    Aes256Gcm::new(key.into())
        .encrypt(Nonce::from_slice(iv), Payload { msg, aad })
        .map_err(|_| CryptoError::Encryption)
}

/// Decrypt `ciphertext || tag` under `key` and `iv`.
///
/// Any tag mismatch (wrong key, flipped bit, truncation) yields
/// [`AuthenticationFailed`]; no partial plaintext is returned.
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
) -> std::result::Result<Vec<u8>, AuthenticationFailed> {
    decrypt_bound(key, iv, ciphertext, &[])
}

/// [`decrypt`] for content sealed by [`encrypt_bound`]; `aad` must be the
/// exact bytes authenticated at encrypt time.
pub fn decrypt_bound(
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> std::result::Result<Vec<u8>, AuthenticationFailed> {
    if ciphertext.len() < TAG_SIZE {
        return Err(AuthenticationFailed);
    }

    Aes256Gcm::new(key.into())
        .decrypt(Nonce::from_slice(iv), Payload { msg: ciphertext, aad })
        .map_err(|_| AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: [u8; KEY_SIZE] = [0x11; KEY_SIZE];
    const KEY_B: [u8; KEY_SIZE] = [0x22; KEY_SIZE];

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"hello, encrypted world!";
        let sealed = encrypt(&KEY_A, plaintext).unwrap();
        let opened = decrypt(&KEY_A, &sealed.iv, &sealed.ciphertext).unwrap();
        assert_eq!(&opened, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let sealed = encrypt(&KEY_A, b"").unwrap();
        assert_eq!(sealed.ciphertext.len(), TAG_SIZE);
        let opened = decrypt(&KEY_A, &sealed.iv, &sealed.ciphertext).unwrap();
        assert!(opened.is_empty());
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let s1 = encrypt(&KEY_A, b"same input").unwrap();
        let s2 = encrypt(&KEY_A, b"same input").unwrap();
        assert_ne!(s1.iv, s2.iv, "IV must never repeat across calls");
        assert_ne!(s1.ciphertext, s2.ciphertext);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let sealed = encrypt(&KEY_A, b"secret data").unwrap();
        assert_eq!(
            decrypt(&KEY_B, &sealed.iv, &sealed.ciphertext),
            Err(AuthenticationFailed)
        );
    }

    #[test]
    fn test_decrypt_wrong_iv() {
        let sealed = encrypt(&KEY_A, b"secret data").unwrap();
        let mut iv = sealed.iv;
        iv[0] ^= 0x01;
        assert!(decrypt(&KEY_A, &iv, &sealed.ciphertext).is_err());
    }

    #[test]
    fn test_tampered_ciphertext() {
        let mut sealed = encrypt(&KEY_A, b"secret data").unwrap();
        sealed.ciphertext[3] ^= 0xFF;
        assert!(decrypt(&KEY_A, &sealed.iv, &sealed.ciphertext).is_err());
    }

    #[test]
    fn test_truncated_ciphertext() {
        let sealed = encrypt(&KEY_A, b"secret data").unwrap();
        for len in [0, 1, TAG_SIZE - 1, sealed.ciphertext.len() - 1] {
            assert!(decrypt(&KEY_A, &sealed.iv, &sealed.ciphertext[..len]).is_err());
        }
    }

    #[test]
    fn test_bound_data_is_authenticated() {
        let bound = encrypt_bound(&KEY_A, b"secret data", |iv| {
            let mut aad = b"header:".to_vec();
            aad.extend_from_slice(iv);
            Ok(aad)
        })
        .unwrap();
        assert!(bound.aad.ends_with(&bound.sealed.iv));

        let sealed = &bound.sealed;
        let opened = decrypt_bound(&KEY_A, &sealed.iv, &sealed.ciphertext, &bound.aad).unwrap();
        assert_eq!(opened, b"secret data");

        let mut altered = bound.aad.clone();
        altered[0] ^= 0x01;
        assert!(decrypt_bound(&KEY_A, &sealed.iv, &sealed.ciphertext, &altered).is_err());
        assert!(decrypt(&KEY_A, &sealed.iv, &sealed.ciphertext).is_err());
    }

    #[test]
    fn test_encrypted_size() {
        let sealed = encrypt(&KEY_A, &[0u8; 1000]).unwrap();
        // plaintext (1000) + tag (16)
        assert_eq!(sealed.ciphertext.len(), 1000 + TAG_SIZE);
    }
}
