//! Share tokens: a raw file key exported as a bearer credential
//!
//! ```text
//! ShareToken := base64url-nopad(file_key)   (43 chars)
//! ShareLink  := <base_url>#key=<ShareToken>
//! ```
//!
//! The token travels in the URL fragment so it never reaches a server in a
//! request line. Anyone holding it can decrypt that one file.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use zeroize::{Zeroize, Zeroizing};

use crate::error::ShareError;
use crate::keys::{FileKey, OwnedFileKey};
use crate::KEY_SIZE;

const FRAGMENT_PARAM: &str = "key";

/// Encoded share token. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareToken(String);

impl ShareToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for ShareToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ShareToken").field(&"[REDACTED]").finish()
    }
}

/// Export an owned file key for sharing.
///
/// Takes [`OwnedFileKey`], which only [`crate::unwrap`] produces: a key that
/// arrived through a share token cannot be re-exported.
pub fn export_for_share(key: &OwnedFileKey) -> ShareToken {
    ShareToken(URL_SAFE_NO_PAD.encode(key.as_bytes()))
}

/// Decode a share token into a file key.
///
/// Surrounding whitespace and trailing `=` padding are tolerated; the decoded
/// value must be exactly 32 bytes.
pub fn import_from_share(token: &str) -> Result<FileKey, ShareError> {
    let normalized = token.trim().trim_end_matches('=');
    if normalized.is_empty() {
        return Err(ShareError::InvalidShareToken("empty token".to_string()));
    }

    let bytes = Zeroizing::new(
        URL_SAFE_NO_PAD
            .decode(normalized)
            .map_err(|e| ShareError::InvalidShareToken(format!("base64url decode: {e}")))?,
    );

    if bytes.len() != KEY_SIZE {
        return Err(ShareError::InvalidShareToken(format!(
            "expected {KEY_SIZE} key bytes, got {}",
            bytes.len()
        )));
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&bytes);
    Ok(FileKey::from_bytes(*key))
}

/// Share link construction and parsing.
pub struct ShareLink;

impl ShareLink {
    /// `https://host/f/abc` + token → `https://host/f/abc#key=<token>`.
    /// Any existing fragment on `base_url` is replaced.
    pub fn build(base_url: &str, token: &ShareToken) -> String {
        let base = base_url.split_once('#').map_or(base_url, |(b, _)| b);
        format!("{base}#{FRAGMENT_PARAM}={token}")
    }

    /// Extract the token from a link's fragment.
    ///
    /// Accepts `#key=<token>` (among other `&`-separated parameters) or a bare
    /// `#<token>`. The token is validated before it is returned.
    pub fn parse(link: &str) -> Result<ShareToken, ShareError> {
        let (_, fragment) = link
            .trim()
            .split_once('#')
            .ok_or_else(|| ShareError::InvalidShareToken("link has no fragment".to_string()))?;

        let candidate = fragment
            .split('&')
            .find_map(|param| param.strip_prefix("key="))
            .unwrap_or(fragment);

        // validate, then keep the normalized form
        let key = import_from_share(candidate)?;
        Ok(ShareToken(URL_SAFE_NO_PAD.encode(key.as_bytes())))
    }
}
