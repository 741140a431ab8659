use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{VaultError, VaultResult};
use crate::types::{CompressionSettings, FilenameEncryptionOptions};
use crate::validate::DEFAULT_MIN_PASSWORD_LEN;

/// Top-level configuration (loaded from vaultpack.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub kdf: KdfConfig,
    pub password: PasswordConfig,
    pub filenames: FilenameEncryptionOptions,
    pub archive: ArchiveConfig,
    pub log: LogConfig,
}

/// PBKDF2 iteration counts.
///
/// Containers do not record these; a file sealed with non-default counts
/// only opens with the same config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// Content key iterations (default: 100000)
    pub iterations: u32,
    /// Filename key iterations, `full` mode (default: 10000)
    pub name_iterations: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            iterations: 100_000,
            name_iterations: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Minimum password length in characters (default: 8)
    pub min_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_PASSWORD_LEN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Write the enhanced variant (archive-wide key + per-file compression)
    pub enhanced: bool,
    /// DEFLATE the package itself (enhanced variant)
    pub solid: bool,
    /// Enhanced variant compression
    pub compression: CompressionSettings,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enhanced: false,
            solid: true,
            compression: CompressionSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl VaultConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> VaultResult<Self> {
        let config: VaultConfig =
            toml::from_str(content).map_err(|e| VaultError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            tracing::debug!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| VaultError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.kdf.iterations == 0 || self.kdf.name_iterations == 0 {
            return Err(VaultError::Config("kdf iterations must be at least 1".into()));
        }
        self.filenames
            .validate()
            .map_err(|e| VaultError::Config(e.to_string()))?;
        self.archive
            .compression
            .validate()
            .map_err(|e| VaultError::Config(e.to_string()))?;
        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(VaultError::Config(format!(
                "log format {other:?} (expected json or text)"
            ))),
        }
    }
}
