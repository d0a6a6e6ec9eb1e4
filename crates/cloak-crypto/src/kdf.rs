//! Key derivation: HKDF-SHA256 for KEKs and legacy content keys, Argon2id
//! for passphrase-derived account secrets

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::secret::AccountSecret;
use crate::KEY_SIZE;

/// HKDF info for key-encryption-keys that wrap per-file keys.
pub const KEK_CONTEXT: &[u8] = b"cloak/kek/v2";

/// HKDF info for content keys of the legacy direct-key generation.
pub const LEGACY_CONTENT_CONTEXT: &[u8] = b"cloak/legacy-content/v1";

/// Derive a 256-bit key from `secret` and `salt` with HKDF-SHA256.
///
/// Deterministic: the same inputs always yield the same key, which is what
/// lets a KEK be recomputed at unwrap time instead of being stored.
/// `secret` must be exactly 32 bytes.
pub fn derive(
    secret: &[u8],
    salt: &[u8],
    context: Option<&[u8]>,
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    if secret.len() != KEY_SIZE {
        return Err(CryptoError::InvalidSecretLength(secret.len()));
    }

    let hkdf = Hkdf::<Sha256>::new(Some(salt), secret);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand(context.unwrap_or_default(), &mut okm[..])
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    Ok(okm)
}

/// [`derive`] rooted at an account secret.
pub(crate) fn derive_from_secret(
    secret: &AccountSecret,
    salt: &[u8],
    context: &[u8],
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    derive(secret.as_bytes(), salt, Some(context))
}

/// Argon2id parameters for passphrase-derived account secrets
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Derive an account secret from a passphrase and salt using Argon2id.
///
/// For deployments that do not keep the raw secret on disk. The salt is not
/// secret but must be stable per account.
pub fn derive_account_secret(
    passphrase: &SecretString,
    salt: &[u8; 16],
    params: &KdfParams,
) -> Result<AccountSecret> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Argon2(format!("invalid params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key[..])
        .map_err(|e| CryptoError::Argon2(e.to_string()))?;

    Ok(AccountSecret::from_bytes(*key))
}
