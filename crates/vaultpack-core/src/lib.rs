pub mod config;
pub mod error;
pub mod types;
pub mod validate;

pub use error::{VaultError, VaultResult};
pub use types::{
    ArchiveMetadata, CompressionMethod, CompressionSettings, FileMetadata,
    FilenameEncryptionOptions, FilenameMode, FolderFileEntry, FolderMetadata, FolderSummary,
    PayloadCompression,
};

/// Manifest entry written once at the root of every archive package
pub const ARCHIVE_METADATA_NAME: &str = "_archive_metadata.json";

/// Manifest entry written under each folder root of an archive package
pub const FOLDER_METADATA_NAME: &str = "_folder_metadata.json";

/// Suffix marking a stored name as encrypted
pub const ENCRYPTED_SUFFIX: &str = ".enc";
