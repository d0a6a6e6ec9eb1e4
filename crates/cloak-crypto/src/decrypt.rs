//! Decryption dispatcher
//!
//! The one entry point the rest of the application calls to open a
//! downloaded buffer. The envelope magic decides the generation; the
//! generation decides an ordered list of [`KeyStrategy`]s; each strategy
//! reports a typed attempt. Which keys happen to be supplied never decides
//! the format.
//!
//! ```text
//! decode ──▶ not ours ─────────────────────────────▶ Unencrypted
//!   │   └──▶ broken ───────────────────────────────▶ CorruptEnvelope
//!   ├─ current: [WrappedKey, ShareToken] ─▶ key ─▶ AEAD ─▶ Decrypted | WrongKeyOrCorrupt
//!   │                                  └─▶ none ─────────▶ KeyUnavailable | InvalidShareToken
//!   └─ legacy:  [LegacyDirect] ──────────▶ AEAD ─▶ Decrypted | WrongKeyOrCorrupt
//!                              └─▶ no secret ───────────▶ KeyUnavailable
//! ```

use std::fmt;

use thiserror::Error;

use crate::aead;
use crate::envelope::{self, CurrentHeader, Envelope, Generation, Header};
use crate::error::{CryptoError, Result};
use crate::keys::{self, FileKey, WrappedFileKey};
use crate::legacy;
use crate::names::suggested_name;
use crate::secret::{AccountSecret, Session};
use crate::share::import_from_share;

/// The ways a content key can be obtained, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Unwrap the supplied WrappedFileKey with the account secret.
    WrappedKey,
    /// Import the raw file key from a share token.
    ShareToken,
    /// Derive the content key directly from the account secret (legacy).
    LegacyDirect,
}

impl KeyStrategy {
    /// Strategies applicable to a generation, in priority order.
    pub fn for_generation(generation: Generation) -> &'static [KeyStrategy] {
        match generation {
            Generation::Current => &[KeyStrategy::WrappedKey, KeyStrategy::ShareToken],
            Generation::Legacy => &[KeyStrategy::LegacyDirect],
        }
    }
}

/// Why a decryption did not produce plaintext.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecryptFailure {
    /// Known magic, broken container. Not retryable.
    #[error("corrupt envelope")]
    CorruptEnvelope,
    /// No usable key material was supplied.
    #[error("no usable key material")]
    KeyUnavailable,
    /// A key was obtained but authenticated decryption failed.
    #[error("wrong key or corrupted content")]
    WrongKeyOrCorrupt,
    /// The only key source offered was a malformed share token.
    #[error("invalid share token")]
    InvalidShareToken,
}

impl DecryptFailure {
    /// Actionable message for the person looking at the file.
    pub fn user_message(&self) -> &'static str {
        match self {
            DecryptFailure::CorruptEnvelope => {
                "This file appears to be corrupted and cannot be decrypted."
            }
            DecryptFailure::KeyUnavailable => {
                "This file is encrypted. Sign in to the owning account or open it with a share link."
            }
            DecryptFailure::WrongKeyOrCorrupt => {
                "The key did not open this file. Try a different account or share link; the file may also be damaged."
            }
            DecryptFailure::InvalidShareToken => {
                "This share link is invalid. Ask the owner to send the link again."
            }
        }
    }

    /// Whether retrying with different key material can help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DecryptFailure::CorruptEnvelope)
    }
}

/// Opt-in behaviour that departs from the authoritative format rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecryptOptions {
    /// Best-effort probing for legacy envelopes on files whose metadata does
    /// not mark them encrypted. Under probing, any failure on such a file is
    /// read as "this was plaintext after all" and a success is flagged
    /// `probed`. Current-generation envelopes are never probed.
    pub legacy_probe: bool,
}

/// Inputs to [`decrypt`]. Build with [`DecryptRequest::new`] and the `with_*`
/// methods; only the buffer and fallback name are required.
#[derive(Clone, Copy)]
pub struct DecryptRequest<'a> {
    pub data: &'a [u8],
    pub secret: Option<&'a AccountSecret>,
    pub wrapped_key: Option<&'a WrappedFileKey>,
    pub share_token: Option<&'a str>,
    /// Name for the recovered plaintext when the header carries no hint.
    pub fallback_name: &'a str,
    /// Whether the file's metadata says it was encrypted (default: true).
    pub marked_encrypted: bool,
    pub options: DecryptOptions,
}

impl<'a> DecryptRequest<'a> {
    pub fn new(data: &'a [u8], fallback_name: &'a str) -> Self {
        Self {
            data,
            secret: None,
            wrapped_key: None,
            share_token: None,
            fallback_name,
            marked_encrypted: true,
            options: DecryptOptions::default(),
        }
    }

    pub fn with_secret(mut self, secret: &'a AccountSecret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Borrow the secret from a session, if it is open.
    pub fn with_session(mut self, session: &'a Session) -> Self {
        self.secret = session.secret();
        self
    }

    pub fn with_wrapped_key(mut self, wrapped_key: &'a WrappedFileKey) -> Self {
        self.wrapped_key = Some(wrapped_key);
        self
    }

    pub fn with_share_token(mut self, token: &'a str) -> Self {
        self.share_token = Some(token);
        self
    }

    pub fn with_marked_encrypted(mut self, marked: bool) -> Self {
        self.marked_encrypted = marked;
        self
    }

    pub fn with_options(mut self, options: DecryptOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for DecryptRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptRequest")
            .field("data_len", &self.data.len())
            .field("secret", &self.secret.is_some())
            .field("wrapped_key", &self.wrapped_key)
            .field("share_token", &self.share_token.map(|_| "[REDACTED]"))
            .field("fallback_name", &self.fallback_name)
            .field("marked_encrypted", &self.marked_encrypted)
            .field("options", &self.options)
            .finish()
    }
}

/// Recovered plaintext.
#[derive(Clone)]
pub struct DecryptedFile {
    pub plaintext: Vec<u8>,
    pub suggested_name: String,
    pub generation: Generation,
    pub strategy: KeyStrategy,
    /// Opened through opt-in legacy probing rather than authoritative rules;
    /// callers may use this to correct the file's metadata.
    pub probed: bool,
}

impl fmt::Debug for DecryptedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedFile")
            .field("plaintext_len", &self.plaintext.len())
            .field("suggested_name", &self.suggested_name)
            .field("generation", &self.generation)
            .field("strategy", &self.strategy)
            .field("probed", &self.probed)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Decrypted(DecryptedFile),
    /// No envelope present: the buffer is the literal file content.
    Unencrypted,
    Failed(DecryptFailure),
}

impl Outcome {
    pub fn failure(&self) -> Option<DecryptFailure> {
        match self {
            Outcome::Failed(failure) => Some(*failure),
            _ => None,
        }
    }

    /// Collapse to `(content, name)`, falling back to the original bytes and
    /// name when the buffer was never encrypted.
    pub fn into_content(
        self,
        data: &[u8],
        fallback_name: &str,
    ) -> std::result::Result<(Vec<u8>, String), DecryptFailure> {
        match self {
            Outcome::Decrypted(file) => Ok((file.plaintext, file.suggested_name)),
            Outcome::Unencrypted => Ok((data.to_vec(), fallback_name.to_string())),
            Outcome::Failed(failure) => Err(failure),
        }
    }
}

/// Result of trying one strategy.
enum Attempt {
    Opened(Vec<u8>),
    /// The inputs this strategy needs were not supplied.
    Unavailable,
    /// Key material was supplied but could not produce a key for this file.
    Rejected,
    InvalidToken,
    /// A key was obtained; the content did not authenticate under it.
    AuthFailed,
}

/// Decrypt a downloaded buffer.
///
/// Expected conditions come back as [`Outcome`]; `Err` is reserved for
/// contract violations and primitive failures.
pub fn decrypt(req: &DecryptRequest<'_>) -> Result<Outcome> {
    let probing = req.options.legacy_probe && !req.marked_encrypted;

    let envelope = match envelope::decode(req.data) {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            tracing::debug!(bytes = req.data.len(), "no envelope magic, treating as unencrypted");
            return Ok(Outcome::Unencrypted);
        }
        Err(e) => {
            if probing && envelope::sniff(req.data) == Some(Generation::Legacy) {
                tracing::debug!(error = %e, "probe: unmarked file with broken legacy envelope");
                return Ok(Outcome::Unencrypted);
            }
            tracing::warn!(error = %e, "corrupt envelope");
            return Ok(Outcome::Failed(DecryptFailure::CorruptEnvelope));
        }
    };

    let generation = envelope.header.generation();
    let outcome = run_strategies(&envelope, req)?;

    if generation != Generation::Legacy || !probing {
        return Ok(outcome);
    }

    Ok(match outcome {
        Outcome::Decrypted(mut file) => {
            tracing::debug!("probe: unmarked file opened as legacy envelope");
            file.probed = true;
            Outcome::Decrypted(file)
        }
        Outcome::Failed(failure) => {
            tracing::debug!(%failure, "probe: legacy open failed, treating as unencrypted");
            Outcome::Unencrypted
        }
        Outcome::Unencrypted => Outcome::Unencrypted,
    })
}

fn run_strategies(envelope: &Envelope<'_>, req: &DecryptRequest<'_>) -> Result<Outcome> {
    let generation = envelope.header.generation();
    let mut saw_invalid_token = false;

    for &strategy in KeyStrategy::for_generation(generation) {
        match attempt(strategy, envelope, req)? {
            Attempt::Opened(plaintext) => {
                tracing::debug!(?strategy, %generation, bytes = plaintext.len(), "decrypted");
                return Ok(Outcome::Decrypted(DecryptedFile {
                    plaintext,
                    suggested_name: suggested_name(req.fallback_name, envelope.header.ext()),
                    generation,
                    strategy,
                    probed: false,
                }));
            }
            Attempt::AuthFailed => {
                tracing::debug!(?strategy, %generation, "content failed authentication");
                return Ok(Outcome::Failed(DecryptFailure::WrongKeyOrCorrupt));
            }
            Attempt::Unavailable => {
                tracing::trace!(?strategy, "strategy inputs not supplied");
            }
            Attempt::Rejected => {
                tracing::debug!(?strategy, "key material rejected, trying next strategy");
            }
            Attempt::InvalidToken => {
                tracing::debug!("share token malformed, trying next strategy");
                saw_invalid_token = true;
            }
        }
    }

    let failure = if saw_invalid_token {
        DecryptFailure::InvalidShareToken
    } else {
        DecryptFailure::KeyUnavailable
    };
    Ok(Outcome::Failed(failure))
}

fn attempt(
    strategy: KeyStrategy,
    envelope: &Envelope<'_>,
    req: &DecryptRequest<'_>,
) -> Result<Attempt> {
    match (strategy, &envelope.header) {
        (KeyStrategy::WrappedKey, Header::Current(header)) => {
            let (Some(secret), Some(wrapped)) = (req.secret, req.wrapped_key) else {
                return Ok(Attempt::Unavailable);
            };
            if wrapped.salt() != &header.key_ref {
                tracing::debug!("wrapped key belongs to a different envelope");
                return Ok(Attempt::Rejected);
            }
            match keys::unwrap(wrapped, secret) {
                Ok(file_key) => Ok(open_current(header, envelope, &file_key)),
                Err(CryptoError::KeyRejected) => Ok(Attempt::Rejected),
                Err(e) => Err(e),
            }
        }
        (KeyStrategy::ShareToken, Header::Current(header)) => {
            let Some(token) = req.share_token else {
                return Ok(Attempt::Unavailable);
            };
            match import_from_share(token) {
                Ok(file_key) => Ok(open_current(header, envelope, &file_key)),
                Err(_) => Ok(Attempt::InvalidToken),
            }
        }
        (KeyStrategy::LegacyDirect, Header::Legacy(header)) => {
            let Some(secret) = req.secret else {
                return Ok(Attempt::Unavailable);
            };
            match legacy::decrypt_legacy(header, envelope.ciphertext, secret) {
                Ok(plaintext) => Ok(Attempt::Opened(plaintext)),
                Err(CryptoError::Authentication(_)) => Ok(Attempt::AuthFailed),
                Err(e) => Err(e),
            }
        }
        // strategy does not apply to this generation
        _ => Ok(Attempt::Unavailable),
    }
}

fn open_current(header: &CurrentHeader, envelope: &Envelope<'_>, file_key: &FileKey) -> Attempt {
    match aead::decrypt_bound(
        file_key.as_bytes(),
        &header.iv,
        envelope.ciphertext,
        envelope.prefix,
    ) {
        Ok(plaintext) => Attempt::Opened(plaintext),
        Err(_) => Attempt::AuthFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encrypt::encrypt_file;
    use crate::keys::unwrap;
    use crate::legacy::encrypt_legacy;
    use crate::share::export_for_share;
    use crate::KEY_SIZE;

    fn owner() -> AccountSecret {
        AccountSecret::from_bytes([0x11; KEY_SIZE])
    }

    fn stranger() -> AccountSecret {
        AccountSecret::from_bytes([0x22; KEY_SIZE])
    }

    fn expect_failure(outcome: Outcome) -> DecryptFailure {
        match outcome {
            Outcome::Failed(failure) => failure,
            other => panic!("expected failure, got {other:?}"),
        }
    }

    fn expect_decrypted(outcome: Outcome) -> DecryptedFile {
        match outcome {
            Outcome::Decrypted(file) => file,
            other => panic!("expected plaintext, got {other:?}"),
        }
    }

    #[test]
    fn test_current_with_wrapped_key() {
        let secret = owner();
        let enc = encrypt_file(b"quarterly numbers", &secret, Some("q3.xlsx")).unwrap();

        let req = DecryptRequest::new(&enc.envelope, "download")
            .with_secret(&secret)
            .with_wrapped_key(&enc.wrapped_key);
        let file = expect_decrypted(decrypt(&req).unwrap());

        assert_eq!(file.plaintext, b"quarterly numbers");
        assert_eq!(file.suggested_name, "download.xlsx");
        assert_eq!(file.generation, Generation::Current);
        assert_eq!(file.strategy, KeyStrategy::WrappedKey);
        assert!(!file.probed);
    }

    #[test]
    fn test_current_with_share_token_only() {
        let secret = owner();
        let enc = encrypt_file(b"shared doc", &secret, None).unwrap();
        let token = export_for_share(&unwrap(&enc.wrapped_key, &secret).unwrap());

        let req = DecryptRequest::new(&enc.envelope, "doc").with_share_token(token.as_str());
        let file = expect_decrypted(decrypt(&req).unwrap());

        assert_eq!(file.plaintext, b"shared doc");
        assert_eq!(file.suggested_name, "doc");
        assert_eq!(file.strategy, KeyStrategy::ShareToken);
    }

    #[test]
    fn test_current_falls_back_to_token_when_unwrap_rejected() {
        let secret = owner();
        let enc = encrypt_file(b"fallback", &secret, None).unwrap();
        let token = export_for_share(&unwrap(&enc.wrapped_key, &secret).unwrap());
        let wrong = stranger();

        let req = DecryptRequest::new(&enc.envelope, "f")
            .with_secret(&wrong)
            .with_wrapped_key(&enc.wrapped_key)
            .with_share_token(token.as_str());
        let file = expect_decrypted(decrypt(&req).unwrap());
        assert_eq!(file.strategy, KeyStrategy::ShareToken);
    }

    #[test]
    fn test_current_without_keys() {
        let secret = owner();
        let enc = encrypt_file(b"locked", &secret, None).unwrap();

        let bare = DecryptRequest::new(&enc.envelope, "f");
        assert_eq!(expect_failure(decrypt(&bare).unwrap()), DecryptFailure::KeyUnavailable);

        // a secret alone is not enough for the current generation
        let secret_only = DecryptRequest::new(&enc.envelope, "f").with_secret(&secret);
        assert_eq!(
            expect_failure(decrypt(&secret_only).unwrap()),
            DecryptFailure::KeyUnavailable
        );
    }

    #[test]
    fn test_current_wrong_secret_is_key_unavailable() {
        let enc = encrypt_file(b"x", &owner(), None).unwrap();
        let wrong = stranger();
        let req = DecryptRequest::new(&enc.envelope, "f")
            .with_secret(&wrong)
            .with_wrapped_key(&enc.wrapped_key);
        assert_eq!(expect_failure(decrypt(&req).unwrap()), DecryptFailure::KeyUnavailable);
    }

    #[test]
    fn test_current_mismatched_wrapped_key_is_skipped() {
        let secret = owner();
        let a = encrypt_file(b"file a", &secret, None).unwrap();
        let b = encrypt_file(b"file b", &secret, None).unwrap();

        let req = DecryptRequest::new(&a.envelope, "a")
            .with_secret(&secret)
            .with_wrapped_key(&b.wrapped_key);
        assert_eq!(expect_failure(decrypt(&req).unwrap()), DecryptFailure::KeyUnavailable);
    }

    #[test]
    fn test_mismatched_wrapped_key_falls_through_to_share_token() {
        let secret = owner();
        let a = encrypt_file(b"file a", &secret, None).unwrap();
        let b = encrypt_file(b"file b", &secret, None).unwrap();
        let token_a = export_for_share(&unwrap(&a.wrapped_key, &secret).unwrap());

        let req = DecryptRequest::new(&a.envelope, "a")
            .with_secret(&secret)
            .with_wrapped_key(&b.wrapped_key)
            .with_share_token(token_a.as_str());
        let file = expect_decrypted(decrypt(&req).unwrap());
        assert_eq!(file.plaintext, b"file a");
        assert_eq!(file.strategy, KeyStrategy::ShareToken);
    }

    #[test]
    fn test_current_header_edit_is_detected() {
        let secret = owner();
        let enc = encrypt_file(b"#!/bin/sh", &secret, Some("notes.txt")).unwrap();

        let mut tampered = enc.envelope.clone();
        let needle = br#""ext":"txt""#;
        let pos = tampered
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap();
        tampered[pos..pos + needle.len()].copy_from_slice(br#""ext":"exe""#);

        // still a well-formed envelope, only the hint changed
        assert_eq!(
            envelope::decode(&tampered).unwrap().unwrap().header.ext(),
            Some("exe")
        );

        let req = DecryptRequest::new(&tampered, "notes")
            .with_secret(&secret)
            .with_wrapped_key(&enc.wrapped_key);
        assert_eq!(
            expect_failure(decrypt(&req).unwrap()),
            DecryptFailure::WrongKeyOrCorrupt
        );
    }

    #[test]
    fn test_current_wrong_share_token() {
        let secret = owner();
        let a = encrypt_file(b"file a", &secret, None).unwrap();
        let b = encrypt_file(b"file b", &secret, None).unwrap();
        let token_b = export_for_share(&unwrap(&b.wrapped_key, &secret).unwrap());

        let req = DecryptRequest::new(&a.envelope, "a").with_share_token(token_b.as_str());
        assert_eq!(
            expect_failure(decrypt(&req).unwrap()),
            DecryptFailure::WrongKeyOrCorrupt
        );
    }

    #[test]
    fn test_current_malformed_share_token() {
        let enc = encrypt_file(b"x", &owner(), None).unwrap();
        let req = DecryptRequest::new(&enc.envelope, "f").with_share_token("not-a-token");
        assert_eq!(
            expect_failure(decrypt(&req).unwrap()),
            DecryptFailure::InvalidShareToken
        );
    }

    #[test]
    fn test_legacy_with_secret() {
        let secret = owner();
        let buf = encrypt_legacy(b"from the old days", &secret, Some("memo.doc")).unwrap();

        let req = DecryptRequest::new(&buf, "memo").with_secret(&secret);
        let file = expect_decrypted(decrypt(&req).unwrap());
        assert_eq!(file.plaintext, b"from the old days");
        assert_eq!(file.suggested_name, "memo.doc");
        assert_eq!(file.generation, Generation::Legacy);
        assert_eq!(file.strategy, KeyStrategy::LegacyDirect);
    }

    #[test]
    fn test_legacy_ignores_share_token_and_wrapped_key() {
        let secret = owner();
        let buf = encrypt_legacy(b"legacy", &secret, None).unwrap();
        let other = encrypt_file(b"current", &secret, None).unwrap();
        let token = export_for_share(&unwrap(&other.wrapped_key, &secret).unwrap());

        let req = DecryptRequest::new(&buf, "f")
            .with_wrapped_key(&other.wrapped_key)
            .with_share_token(token.as_str());
        assert_eq!(expect_failure(decrypt(&req).unwrap()), DecryptFailure::KeyUnavailable);
    }

    #[test]
    fn test_legacy_wrong_secret() {
        let buf = encrypt_legacy(b"legacy", &owner(), None).unwrap();
        let wrong = stranger();
        let req = DecryptRequest::new(&buf, "f").with_secret(&wrong);
        assert_eq!(
            expect_failure(decrypt(&req).unwrap()),
            DecryptFailure::WrongKeyOrCorrupt
        );
    }

    #[test]
    fn test_plain_buffer_is_unencrypted() {
        let secret = owner();
        let req = DecryptRequest::new(b"just a text file\n", "notes.txt").with_secret(&secret);
        let outcome = decrypt(&req).unwrap();
        assert!(matches!(outcome, Outcome::Unencrypted));

        let (content, name) = outcome.into_content(req.data, req.fallback_name).unwrap();
        assert_eq!(content, b"just a text file\n");
        assert_eq!(name, "notes.txt");
    }

    #[test]
    fn test_corrupt_envelope() {
        let secret = owner();
        let mut buf = encrypt_file(b"x", &secret, None).unwrap().envelope;
        buf[8..12].copy_from_slice(&u32::MAX.to_be_bytes());

        let req = DecryptRequest::new(&buf, "f").with_secret(&secret);
        let failure = expect_failure(decrypt(&req).unwrap());
        assert_eq!(failure, DecryptFailure::CorruptEnvelope);
        assert!(!failure.is_retryable());
    }

    #[test]
    fn test_session_supplies_secret() {
        let mut session = Session::open(owner());
        let enc = encrypt_file(b"session", &owner(), None).unwrap();

        let req = DecryptRequest::new(&enc.envelope, "f")
            .with_session(&session)
            .with_wrapped_key(&enc.wrapped_key);
        assert!(matches!(decrypt(&req).unwrap(), Outcome::Decrypted(_)));

        session.clear();
        let req = DecryptRequest::new(&enc.envelope, "f")
            .with_session(&session)
            .with_wrapped_key(&enc.wrapped_key);
        assert_eq!(expect_failure(decrypt(&req).unwrap()), DecryptFailure::KeyUnavailable);
    }

    #[test]
    fn test_probe_disabled_keeps_authoritative_result() {
        let buf = encrypt_legacy(b"legacy", &owner(), None).unwrap();
        let wrong = stranger();
        let req = DecryptRequest::new(&buf, "f")
            .with_secret(&wrong)
            .with_marked_encrypted(false);
        assert_eq!(
            expect_failure(decrypt(&req).unwrap()),
            DecryptFailure::WrongKeyOrCorrupt
        );
    }

    #[test]
    fn test_probe_unmarked_legacy() {
        let secret = owner();
        let buf = encrypt_legacy(b"probed", &secret, None).unwrap();
        let probe = DecryptOptions { legacy_probe: true };

        let req = DecryptRequest::new(&buf, "f")
            .with_secret(&secret)
            .with_marked_encrypted(false)
            .with_options(probe);
        let file = expect_decrypted(decrypt(&req).unwrap());
        assert!(file.probed);

        let wrong = stranger();
        let req = DecryptRequest::new(&buf, "f")
            .with_secret(&wrong)
            .with_marked_encrypted(false)
            .with_options(probe);
        assert!(matches!(decrypt(&req).unwrap(), Outcome::Unencrypted));

        // marked files are never probed
        let req = DecryptRequest::new(&buf, "f")
            .with_secret(&wrong)
            .with_options(probe);
        assert_eq!(
            expect_failure(decrypt(&req).unwrap()),
            DecryptFailure::WrongKeyOrCorrupt
        );
    }

    #[test]
    fn test_probe_broken_legacy_magic_collision() {
        let mut buf = b"CLOAKv01".to_vec();
        buf.extend_from_slice(b"... and the rest of someone's notes");
        let probe = DecryptOptions { legacy_probe: true };

        let req = DecryptRequest::new(&buf, "f")
            .with_marked_encrypted(false)
            .with_options(probe);
        assert!(matches!(decrypt(&req).unwrap(), Outcome::Unencrypted));

        let strict = DecryptRequest::new(&buf, "f").with_marked_encrypted(false);
        assert_eq!(
            expect_failure(decrypt(&strict).unwrap()),
            DecryptFailure::CorruptEnvelope
        );
    }

    #[test]
    fn test_probe_never_touches_current() {
        let enc = encrypt_file(b"x", &owner(), None).unwrap();
        let req = DecryptRequest::new(&enc.envelope, "f")
            .with_marked_encrypted(false)
            .with_options(DecryptOptions { legacy_probe: true });
        assert_eq!(expect_failure(decrypt(&req).unwrap()), DecryptFailure::KeyUnavailable);
    }

    #[test]
    fn test_strategy_order() {
        assert_eq!(
            KeyStrategy::for_generation(Generation::Current),
            &[KeyStrategy::WrappedKey, KeyStrategy::ShareToken]
        );
        assert_eq!(
            KeyStrategy::for_generation(Generation::Legacy),
            &[KeyStrategy::LegacyDirect]
        );
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let all = [
            DecryptFailure::CorruptEnvelope,
            DecryptFailure::KeyUnavailable,
            DecryptFailure::WrongKeyOrCorrupt,
            DecryptFailure::InvalidShareToken,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(!a.user_message().is_empty());
            for b in &all[i + 1..] {
                assert_ne!(a.user_message(), b.user_message());
            }
        }
    }

    #[test]
    fn test_request_debug_redacts_token() {
        let req = DecryptRequest::new(b"", "f").with_share_token("SECRET-TOKEN-VALUE");
        let rendered = format!("{req:?}");
        assert!(!rendered.contains("SECRET-TOKEN-VALUE"));
    }
}
