//! Envelope container: magic, header length, JSON header, ciphertext
//!
//! ```text
//! [8 bytes: magic][4 bytes: HEADER_LEN, u32 BE][HEADER_LEN bytes: UTF-8 JSON][rest: ciphertext + tag]
//! ```
//!
//! The magic alone selects the generation. A buffer whose first eight bytes
//! match neither magic is not ours (`Ok(None)`); a buffer that matches but is
//! structurally broken is an [`EnvelopeError`].

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, EnvelopeError, Result};
use crate::legacy::LegacyHeader;
use crate::{IV_SIZE, SALT_SIZE};

pub const MAGIC_LEN: usize = 8;

/// Legacy direct-key generation.
pub const LEGACY_MAGIC: [u8; MAGIC_LEN] = *b"CLOAKv01";

/// Current wrapped-per-file-key generation.
pub const CURRENT_MAGIC: [u8; MAGIC_LEN] = *b"CLOAKv02";

/// Magic plus the u32 header length.
pub const PREFIX_LEN: usize = MAGIC_LEN + 4;

/// The only content algorithm either generation has ever used.
pub const ALG_AES_256_GCM: &str = "AES-256-GCM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    Legacy,
    Current,
}

impl Generation {
    pub fn magic(self) -> &'static [u8; MAGIC_LEN] {
        match self {
            Generation::Legacy => &LEGACY_MAGIC,
            Generation::Current => &CURRENT_MAGIC,
        }
    }

    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        if magic == LEGACY_MAGIC {
            Some(Generation::Legacy)
        } else if magic == CURRENT_MAGIC {
            Some(Generation::Current)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Generation::Legacy => f.write_str("legacy"),
            Generation::Current => f.write_str("current"),
        }
    }
}

/// Header of a current-generation envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentHeader {
    pub alg: String,
    /// Content IV for the file key.
    #[serde(with = "b64")]
    pub iv: [u8; IV_SIZE],
    /// KEK salt of the wrapped key sealed together with this envelope.
    #[serde(with = "b64")]
    pub key_ref: [u8; SALT_SIZE],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
}

/// Envelope header, tagged by generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Legacy(LegacyHeader),
    Current(CurrentHeader),
}

impl Header {
    pub fn generation(&self) -> Generation {
        match self {
            Header::Legacy(_) => Generation::Legacy,
            Header::Current(_) => Generation::Current,
        }
    }

    pub fn ext(&self) -> Option<&str> {
        match self {
            Header::Legacy(h) => h.ext.as_deref(),
            Header::Current(h) => h.ext.as_deref(),
        }
    }

    fn alg(&self) -> &str {
        match self {
            Header::Legacy(h) => &h.alg,
            Header::Current(h) => &h.alg,
        }
    }

    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Header::Legacy(h) => serde_json::to_vec(h),
            Header::Current(h) => serde_json::to_vec(h),
        }
    }
}

/// A decoded envelope borrowing its ciphertext from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub header: Header,
    /// `MAGIC | HEADER_LEN | HEADER_JSON` exactly as read. Current-generation
    /// content authenticates these bytes as associated data.
    pub prefix: &'a [u8],
    pub ciphertext: &'a [u8],
}

/// Serialize everything ahead of the ciphertext: magic, length, header JSON.
pub fn encode_prefix(header: &Header) -> Result<Vec<u8>> {
    let json = header.to_json()?;
    let header_len =
        u32::try_from(json.len()).map_err(|_| CryptoError::HeaderTooLarge(json.len()))?;

    let mut out = Vec::with_capacity(PREFIX_LEN + json.len());
    out.extend_from_slice(header.generation().magic());
    out.extend_from_slice(&header_len.to_be_bytes());
    out.extend_from_slice(&json);
    Ok(out)
}

/// Serialize an envelope. The magic is chosen by the header's generation.
pub fn encode(header: &Header, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut out = encode_prefix(header)?;
    out.extend_from_slice(ciphertext);
    Ok(out)
}

/// Generation named by the buffer's magic, without validating anything else.
pub fn sniff(buf: &[u8]) -> Option<Generation> {
    buf.get(..MAGIC_LEN).and_then(Generation::from_magic)
}

/// Parse an envelope.
///
/// `Ok(None)`: no known magic, the buffer is opaque to this engine.
/// `Err(_)`: known magic, broken structure. Surface it; never treat it as plaintext.
pub fn decode(buf: &[u8]) -> std::result::Result<Option<Envelope<'_>>, EnvelopeError> {
    let Some(generation) = sniff(buf) else {
        return Ok(None);
    };

    if buf.len() < PREFIX_LEN {
        return Err(EnvelopeError::Truncated {
            len: buf.len(),
            needed: PREFIX_LEN,
        });
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&buf[MAGIC_LEN..PREFIX_LEN]);
    let header_len = u32::from_be_bytes(len_bytes) as usize;

    let available = buf.len() - PREFIX_LEN;
    if header_len > available {
        return Err(EnvelopeError::HeaderOverrun {
            header_len,
            available,
        });
    }

    let (prefix, ciphertext) = buf.split_at(PREFIX_LEN + header_len);
    let json = &prefix[PREFIX_LEN..];
    let header = match generation {
        Generation::Legacy => serde_json::from_slice(json).map(Header::Legacy),
        Generation::Current => serde_json::from_slice(json).map(Header::Current),
    }
    .map_err(|e| EnvelopeError::Header(e.to_string()))?;

    if header.alg() != ALG_AES_256_GCM {
        return Err(EnvelopeError::UnsupportedAlgorithm(header.alg().to_string()));
    }

    Ok(Some(Envelope {
        header,
        prefix,
        ciphertext,
    }))
}

/// Key-free summary of an envelope, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeInfo {
    pub generation: Generation,
    pub alg: String,
    pub ext: Option<String>,
    /// Base64 KEK salt of the matching wrapped key (current generation only).
    pub key_ref: Option<String>,
    pub header_len: usize,
    pub ciphertext_len: usize,
}

pub fn inspect(buf: &[u8]) -> std::result::Result<Option<EnvelopeInfo>, EnvelopeError> {
    let Some(envelope) = decode(buf)? else {
        return Ok(None);
    };

    let key_ref = match &envelope.header {
        Header::Current(h) => Some(b64::encode(&h.key_ref)),
        Header::Legacy(_) => None,
    };

    Ok(Some(EnvelopeInfo {
        generation: envelope.header.generation(),
        alg: envelope.header.alg().to_string(),
        ext: envelope.header.ext().map(str::to_string),
        key_ref,
        header_len: buf.len() - PREFIX_LEN - envelope.ciphertext.len(),
        ciphertext_len: envelope.ciphertext.len(),
    }))
}

/// Serde adapter: fixed-size byte arrays as standard base64 strings.
pub(crate) mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(s.as_bytes()).map_err(D::Error::custom)?;
        <[u8; N]>::try_from(bytes.as_slice())
            .map_err(|_| D::Error::custom(format!("expected {N} bytes, got {}", bytes.len())))
    }
}
