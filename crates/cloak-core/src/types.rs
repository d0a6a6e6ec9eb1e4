use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CloakError, CloakResult};

/// Sidecar suffix for metadata written next to an encrypted object
pub const META_SUFFIX: &str = "cloakmeta.json";

/// File metadata the storage layer keeps alongside an encrypted object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub version: u32,
    /// Whether the object was stored encrypted
    pub encrypted: bool,
    /// Envelope generation: "legacy" or "current"
    pub generation: Option<String>,
    /// Original file name
    pub name: String,
    /// Wrapped file key, base64 (current generation only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_key: Option<String>,
}

impl FileMeta {
    pub const VERSION: u32 = 1;

    pub fn plaintext(name: impl Into<String>) -> Self {
        Self {
            version: Self::VERSION,
            encrypted: false,
            generation: None,
            name: name.into(),
            wrapped_key: None,
        }
    }

    pub fn encrypted(
        name: impl Into<String>,
        generation: impl Into<String>,
        wrapped_key: Option<String>,
    ) -> Self {
        Self {
            version: Self::VERSION,
            encrypted: true,
            generation: Some(generation.into()),
            name: name.into(),
            wrapped_key,
        }
    }

    /// `photo.jpg.cloak` → `photo.jpg.cloak.cloakmeta.json`
    pub fn sidecar_path(object: &Path) -> PathBuf {
        let mut name = object.as_os_str().to_owned();
        name.push(".");
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }

    pub fn to_bytes(&self) -> CloakResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| CloakError::Metadata(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> CloakResult<Self> {
        let meta: Self =
            serde_json::from_slice(data).map_err(|e| CloakError::Metadata(e.to_string()))?;
        if meta.version != Self::VERSION {
            return Err(CloakError::Metadata(format!(
                "unsupported metadata version {}",
                meta.version
            )));
        }
        Ok(meta)
    }

    pub fn read(path: &Path) -> CloakResult<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    pub fn write(&self, path: &Path) -> CloakResult<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}
