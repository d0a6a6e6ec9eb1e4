use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CloakError, CloakResult};

/// Top-level client configuration (loaded from cloak.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloakConfig {
    pub logging: LoggingConfig,
    pub account: AccountConfig,
    pub decrypt: DecryptConfig,
    pub share: ShareConfig,
}

impl CloakConfig {
    /// Parse a config file; a missing file yields defaults.
    pub fn load(path: &Path) -> CloakResult<Self> {
        if !path.exists() {
            tracing::debug!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| CloakError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> CloakResult<Self> {
        toml::from_str(content).map_err(|e| CloakError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Where the account secret comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// File holding the secret as hex or base64
    pub secret_file: Option<PathBuf>,
    /// Base64 16-byte salt for passphrase-derived secrets
    pub passphrase_salt: Option<String>,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            secret_file: None,
            passphrase_salt: None,
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecryptConfig {
    /// Best-effort legacy probing for files not marked encrypted
    pub legacy_probe: bool,
    /// Output name when neither the input path nor the header gives one
    pub default_name: String,
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            legacy_probe: false,
            default_name: "download".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Prefix for share links; the object name is appended
    pub base_url: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cloak.example/f".into(),
        }
    }
}
