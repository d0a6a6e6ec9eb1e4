//! cloak-crypto: client-held encryption engine for cloak file storage
//!
//! File content is sealed on the client before upload and opened after
//! download. The account secret never reaches the storage layer.
//!
//! Key hierarchy:
//! ```text
//! Account Secret (256-bit, session-held, never transmitted)
//!   ├── KEK (HKDF-SHA256, random salt per wrap, info="cloak/kek/v2")
//!   │   └── wraps File Key (per-file, 256-bit random) → WrappedFileKey metadata
//!   │         └── Content AEAD: AES-256-GCM (key=file_key, iv=random 96-bit)
//!   └── Legacy content key (HKDF-SHA256, salt in header, info="cloak/legacy-content/v1")
//!         └── Content AEAD: AES-256-GCM directly under the derived key
//! ```
//!
//! Envelope (both generations):
//! ```text
//! MAGIC(8) | HEADER_LEN(u32 BE) | HEADER_JSON | CIPHERTEXT+TAG
//! ```
//!
//! A file key may leave the owning session only as a [`ShareToken`], and only
//! after the owner has proven possession by unwrapping it.

pub mod aead;
pub mod decrypt;
pub mod encrypt;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod legacy;
pub mod names;
pub mod recovery;
pub mod secret;
pub mod share;

pub use decrypt::{
    decrypt, DecryptFailure, DecryptOptions, DecryptRequest, DecryptedFile, KeyStrategy, Outcome,
};
pub use encrypt::{encrypt_file, EncryptedFile};
pub use envelope::{inspect, EnvelopeInfo, Generation};
pub use error::{AuthenticationFailed, CryptoError, EnvelopeError, Result, ShareError};
pub use kdf::{derive, derive_account_secret, KdfParams};
pub use keys::{generate_file_key, unwrap, wrap, FileKey, OwnedFileKey, WrappedFileKey};
pub use legacy::encrypt_legacy;
pub use recovery::{mnemonic_to_secret, secret_to_mnemonic};
pub use secret::{AccountSecret, Session};
pub use share::{export_for_share, import_from_share, ShareLink, ShareToken};

/// Size of every symmetric key in the engine (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-256-GCM IV (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the random salts fed to HKDF
pub const SALT_SIZE: usize = 16;
