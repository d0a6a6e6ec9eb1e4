//! BIP-39 recovery phrase for the account secret
//!
//! The 32-byte secret is exactly 256 bits of entropy, so the 24-word phrase
//! encodes the secret itself rather than a key derived from it. Writing the
//! phrase down is a complete backup; it is never stored digitally.

use bip39::Mnemonic;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::secret::AccountSecret;

/// Render the account secret as a 24-word BIP-39 phrase.
pub fn secret_to_mnemonic(secret: &AccountSecret) -> Result<Zeroizing<String>> {
    let mnemonic = Mnemonic::from_entropy(secret.as_bytes())
        .map_err(|e| CryptoError::Mnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Recover the account secret from its 24-word phrase.
pub fn mnemonic_to_secret(words: &str) -> Result<AccountSecret> {
    let mnemonic: Mnemonic = words
        .trim()
        .parse()
        .map_err(|e: bip39::Error| CryptoError::Mnemonic(e.to_string()))?;

    let entropy = Zeroizing::new(mnemonic.to_entropy());
    AccountSecret::from_slice(&entropy)
}
