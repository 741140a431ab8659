//! Metadata records shared by the container and archive codecs.
//!
//! Every record serializes to JSON with camelCase keys. Optional fields that
//! only the enhanced archive variant produces are omitted when absent so that
//! password-only containers carry the same key set as every other writer of
//! the format.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{VaultError, VaultResult};
use crate::ENCRYPTED_SUFFIX;

/// How the stored filename (outside the container) is transformed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilenameMode {
    /// Name kept visible, marked with `.enc`
    #[default]
    None,
    /// One-way hashed prefix; hides the name from casual listing only
    Partial,
    /// Reversible authenticated encryption of the name
    Full,
}

impl std::fmt::Display for FilenameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilenameMode::None => "none",
            FilenameMode::Partial => "partial",
            FilenameMode::Full => "full",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for FilenameMode {
    type Err = VaultError;

    fn from_str(s: &str) -> VaultResult<Self> {
        match s {
            "none" => Ok(FilenameMode::None),
            "partial" => Ok(FilenameMode::Partial),
            "full" => Ok(FilenameMode::Full),
            other => Err(VaultError::Input(format!(
                "unknown filename mode {other:?} (expected none, partial or full)"
            ))),
        }
    }
}

/// Filename obfuscation settings.
///
/// With `preserve_extensions` set, the original extension stays readable in
/// `partial` and `full` mode. This leaks the file type to anyone listing the
/// package in exchange for letting tools recognize the entries; it is off by
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilenameEncryptionOptions {
    pub mode: FilenameMode,
    #[serde(alias = "preserve_extensions")]
    pub preserve_extensions: bool,
    #[serde(alias = "custom_prefix")]
    pub custom_prefix: String,
}

impl Default for FilenameEncryptionOptions {
    fn default() -> Self {
        Self {
            mode: FilenameMode::None,
            preserve_extensions: false,
            custom_prefix: "enc".into(),
        }
    }
}

impl FilenameEncryptionOptions {
    pub fn new(mode: FilenameMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_preserved_extensions(mut self, preserve: bool) -> Self {
        self.preserve_extensions = preserve;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.custom_prefix = prefix.into();
        self
    }

    /// Reject prefixes that would produce unusable or path-altering names.
    pub fn validate(&self) -> VaultResult<()> {
        if self.mode != FilenameMode::Partial {
            return Ok(());
        }
        if self.custom_prefix.is_empty() {
            return Err(VaultError::Input("filename prefix must not be empty".into()));
        }
        if !self
            .custom_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(VaultError::Input(format!(
                "filename prefix {:?} may only contain ASCII letters, digits, '-' and '_'",
                self.custom_prefix
            )));
        }
        Ok(())
    }
}

/// Per-file compression method for the enhanced archive variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// No per-file pass; the package-level DEFLATE still applies when solid
    Store,
    #[default]
    Zstd,
}

/// Compression settings recorded in the enhanced archive manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSettings {
    pub method: CompressionMethod,
    /// 0 (store) to 9 (slowest, smallest)
    pub level: u8,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Zstd,
            level: 5,
        }
    }
}

impl CompressionSettings {
    pub const MAX_LEVEL: u8 = 9;

    pub fn validate(&self) -> VaultResult<()> {
        if self.level > Self::MAX_LEVEL {
            return Err(VaultError::Input(format!(
                "compression level {} out of range 0..={}",
                self.level,
                Self::MAX_LEVEL
            )));
        }
        Ok(())
    }

    /// Whether the per-file pass runs at all
    pub fn compresses_payload(&self) -> bool {
        self.method != CompressionMethod::Store && self.level > 0
    }
}

/// Marks a container payload that was compressed before encryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadCompression {
    pub method: CompressionMethod,
    pub level: u8,
    pub compressed_size: u64,
}

/// Metadata embedded (in the clear) in every container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub original_name: String,
    pub original_size: u64,
    pub mime_type: String,
    /// Creation time of the container, milliseconds since the Unix epoch
    pub timestamp: u64,
    pub has_hardware_key: bool,
    /// Path relative to the selected folder root; empty for individual files
    #[serde(default)]
    pub relative_path: String,
    #[serde(default)]
    pub is_from_folder: bool,
    /// Ancestor folder names, outermost first
    #[serde(default)]
    pub folder_structure: Vec<String>,
    #[serde(default)]
    pub filename_encryption: FilenameEncryptionOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_compression: Option<PayloadCompression>,
}

impl FileMetadata {
    /// Metadata for `name`, guessing the MIME type from its extension.
    ///
    /// `relative_path` may be empty; when set it determines the folder
    /// structure.
    pub fn new(name: impl Into<String>, size: u64, relative_path: impl Into<String>) -> Self {
        let original_name = name.into();
        let relative_path = relative_path.into();
        let folder_structure = folder_structure_of(&relative_path);
        Self {
            mime_type: guess_mime_type(&original_name),
            original_name,
            original_size: size,
            timestamp: now_millis(),
            has_hardware_key: false,
            is_from_folder: !relative_path.is_empty(),
            relative_path,
            folder_structure,
            filename_encryption: FilenameEncryptionOptions::default(),
            last_modified: None,
            payload_compression: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_filename_encryption(mut self, options: FilenameEncryptionOptions) -> Self {
        self.filename_encryption = options;
        self
    }

    pub fn with_last_modified(mut self, millis: Option<u64>) -> Self {
        self.last_modified = millis;
        self
    }

    /// The path a decrypting party should restore this file to.
    pub fn restore_path(&self) -> &str {
        if self.relative_path.is_empty() {
            &self.original_name
        } else {
            &self.relative_path
        }
    }
}

/// One folder root in the archive manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    pub name: String,
    pub file_count: usize,
}

/// Archive-level manifest, stored as `_archive_metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
    pub version: String,
    pub encryption_method: String,
    pub total_files: usize,
    #[serde(default)]
    pub folders: Vec<FolderSummary>,
    #[serde(default)]
    pub individual_files: usize,
    pub has_hardware_key: bool,
    pub timestamp: u64,
    #[serde(default)]
    pub filename_encryption: FilenameEncryptionOptions,
    #[serde(default)]
    pub total_original_size: u64,
    /// Present only for the enhanced variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionSettings>,
    #[serde(default)]
    pub solid: bool,
    /// Hex salt for the archive-wide key; present only for the enhanced variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl ArchiveMetadata {
    pub const VERSION: &'static str = "1.0";
    pub const ENCRYPTION_METHOD: &'static str = "AES-GCM-256";

    pub fn is_enhanced(&self) -> bool {
        self.salt.is_some()
    }

    pub fn to_json(&self) -> VaultResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> VaultResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| VaultError::Format(format!("archive manifest unparseable: {e}")))
    }
}

/// One file listed in a folder manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderFileEntry {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub path: String,
}

/// Per-folder manifest, stored as `{folder}/_folder_metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMetadata {
    pub name: String,
    pub file_count: usize,
    pub total_size: u64,
    /// Only written when filenames are not obfuscated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FolderFileEntry>>,
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Ancestor folders of a `/`-separated relative path
pub fn folder_structure_of(relative_path: &str) -> Vec<String> {
    let mut parts: Vec<String> = relative_path
        .split('/')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    parts.pop();
    parts
}

/// Split `name` at its last dot into `(stem, extension)`.
///
/// The extension keeps its dot. A leading dot (`.bashrc`) is part of the stem.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Strip one trailing `.enc`, if present
pub fn strip_encrypted_suffix(name: &str) -> &str {
    name.strip_suffix(ENCRYPTED_SUFFIX).unwrap_or(name)
}

/// MIME type for a filename, by extension; `application/octet-stream` when unknown
pub fn guess_mime_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
