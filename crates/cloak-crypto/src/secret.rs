//! Account secret and the caller-owned session handle that holds it

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, Result};
use crate::KEY_SIZE;

/// The 256-bit root of every key an account derives.
///
/// Held only by the client for the duration of a session. Zeroized on drop;
/// deliberately not `Clone` so the engine never multiplies copies of it.
pub struct AccountSecret {
    bytes: [u8; KEY_SIZE],
}

impl AccountSecret {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Accepts a raw slice, rejecting anything that is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidSecretLength(bytes.len()));
        }
        let mut buf = Zeroizing::new([0u8; KEY_SIZE]);
        buf.copy_from_slice(bytes);
        Ok(Self::from_bytes(*buf))
    }

    /// Generate a fresh random secret (new account enrollment).
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        rand::thread_rng().fill_bytes(&mut bytes[..]);
        Self::from_bytes(*bytes)
    }

    /// Parse a textual secret.
    ///
    /// Normalization: surrounding whitespace is trimmed, then the input is
    /// read as 64 hex digits (optional `0x` prefix), standard base64, or
    /// unpadded base64url. The decoded value must be exactly 32 bytes.
    pub fn parse(encoded: &str) -> Result<Self> {
        let trimmed = encoded.trim();
        let hex_digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let decoded = if hex_digits.len() == KEY_SIZE * 2
            && hex_digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            Zeroizing::new(hex::decode(hex_digits).map_err(CryptoError::SecretEncoding)?)
        } else if let Ok(bytes) = STANDARD.decode(trimmed) {
            Zeroizing::new(bytes)
        } else {
            Zeroizing::new(URL_SAFE_NO_PAD.decode(trimmed).map_err(|_| {
                CryptoError::SecretEncoding("expected 64 hex digits or base64".to_string())
            })?)
        };

        Self::from_slice(&decoded)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Lowercase hex rendering, for display to the account owner only.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.bytes))
    }

    /// Overwrite the secret in place. The value is unusable afterwards.
    pub fn zero(&mut self) {
        self.bytes.zeroize();
    }
}

impl Drop for AccountSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for AccountSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Session-scoped holder of the account secret.
///
/// The surrounding application owns exactly one of these per logged-in user
/// and lends the secret to each engine call. `clear` on logout.
#[derive(Debug, Default)]
pub struct Session {
    secret: Option<AccountSecret>,
}

impl Session {
    pub fn open(secret: AccountSecret) -> Self {
        Self {
            secret: Some(secret),
        }
    }

    pub fn secret(&self) -> Option<&AccountSecret> {
        self.secret.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.secret.is_some()
    }

    /// Zero and forget the secret.
    pub fn clear(&mut self) {
        if let Some(mut secret) = self.secret.take() {
            secret.zero();
            tracing::debug!("session cleared");
        }
    }
}

mod hex {
    pub fn encode(data: &[u8]) -> String {
        let mut s = String::with_capacity(data.len() * 2);
        for byte in data {
            s.push_str(&format!("{:02x}", byte));
        }
        s
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd-length hex string".to_string());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| format!("invalid hex: {e}")))
            .collect()
    }
}
