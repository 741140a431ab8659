//! Archive packages: many sealed containers in one zip
//!
//! Package layout:
//! ```text
//! _archive_metadata.json                 ArchiveMetadata (clear JSON)
//! {folder}/_folder_metadata.json         FolderMetadata, one per folder root
//! {folder}/{interior/dirs}/{stored name} container
//! {stored name}                          container for an individually selected file
//! ```
//!
//! Only the leaf name of each entry is obfuscated; folder roots and interior
//! directories stay readable.
//!
//! The standard variant seals every container with its own PBKDF2 key and
//! deflates the package. The enhanced variant derives one archive-wide key
//! from a salt recorded in the manifest, re-derives each container key from it
//! with HKDF, and can compress payloads with zstd before encryption.

use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read, Write};

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod as ZipMethod, ZipArchive, ZipWriter};

use vaultpack_core::config::VaultConfig;
use vaultpack_core::types::now_millis;
use vaultpack_core::validate::validate_relative_path;
use vaultpack_core::{
    ArchiveMetadata, CompressionSettings, FileMetadata, FilenameEncryptionOptions, FilenameMode,
    FolderFileEntry, FolderMetadata, FolderSummary, VaultError, VaultResult,
    ARCHIVE_METADATA_NAME, FOLDER_METADATA_NAME,
};
use vaultpack_crypto::{
    derive_key, hex, ContainerCodec, DerivedKey, EncryptionSecret, KeySource, SALT_SIZE,
};

use crate::compress::CompressionCapability;
use crate::input::InputFile;
use crate::phase::{OperationPhase, PhaseTracker};
use crate::progress::{ProgressFn, ProgressReporter};

/// DEFLATE level of the standard variant's package
const STANDARD_DEFLATE_LEVEL: i64 = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveVariant {
    /// Per-container PBKDF2 keys, package deflated at level 6
    #[default]
    Standard,
    /// Archive-wide key with per-file HKDF, optional zstd payload pass.
    ///
    /// `solid` deflates the package at the compression level; otherwise the
    /// package entries are stored.
    Enhanced {
        compression: CompressionSettings,
        solid: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub filenames: FilenameEncryptionOptions,
    pub variant: ArchiveVariant,
}

impl ArchiveOptions {
    pub fn new(filenames: FilenameEncryptionOptions) -> Self {
        Self {
            filenames,
            variant: ArchiveVariant::Standard,
        }
    }

    pub fn enhanced(mut self, compression: CompressionSettings, solid: bool) -> Self {
        self.variant = ArchiveVariant::Enhanced { compression, solid };
        self
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        let options = Self::new(config.filenames.clone());
        if config.archive.enhanced {
            options.enhanced(config.archive.compression, config.archive.solid)
        } else {
            options
        }
    }

    pub fn validate(&self) -> VaultResult<()> {
        self.filenames.validate()?;
        if let ArchiveVariant::Enhanced { compression, .. } = &self.variant {
            compression.validate()?;
        }
        Ok(())
    }

    fn package_options(&self) -> SimpleFileOptions {
        match self.variant {
            ArchiveVariant::Standard => deflated(STANDARD_DEFLATE_LEVEL),
            ArchiveVariant::Enhanced { compression, solid } if solid && compression.level > 0 => {
                deflated(i64::from(compression.level.min(CompressionSettings::MAX_LEVEL)))
            }
            ArchiveVariant::Enhanced { .. } => {
                SimpleFileOptions::default().compression_method(ZipMethod::Stored)
            }
        }
    }
}

fn deflated(level: i64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(ZipMethod::Deflated)
        .compression_level(Some(level))
}

/// One file restored from a package
#[derive(Debug, Clone)]
pub struct DecryptedFile {
    /// Restored `/`-separated path, already checked to stay relative
    pub path: String,
    pub data: Vec<u8>,
    pub metadata: FileMetadata,
}

#[derive(Debug)]
pub struct UnpackedArchive {
    pub files: Vec<DecryptedFile>,
    pub manifest: ArchiveMetadata,
    pub folders: Vec<FolderMetadata>,
}

#[derive(Default)]
struct FolderTally {
    file_count: usize,
    total_size: u64,
    files: Vec<FolderFileEntry>,
}

#[derive(Clone)]
pub struct ArchiveCodec {
    containers: ContainerCodec,
    compression: CompressionCapability,
}

impl Default for ArchiveCodec {
    fn default() -> Self {
        Self::new(ContainerCodec::default())
    }
}

impl ArchiveCodec {
    /// Wrap a container codec, probing payload compression once.
    pub fn new(containers: ContainerCodec) -> Self {
        Self::with_capability(containers, CompressionCapability::probe())
    }

    pub fn with_capability(containers: ContainerCodec, compression: CompressionCapability) -> Self {
        Self {
            containers,
            compression,
        }
    }

    pub fn containers(&self) -> &ContainerCodec {
        &self.containers
    }

    pub fn compression(&self) -> CompressionCapability {
        self.compression
    }

    /// Seal `files` into one package.
    ///
    /// Any per-file failure aborts the whole operation; no partial package is
    /// returned.
    pub fn pack_many(
        &self,
        files: &[InputFile],
        secret: &EncryptionSecret,
        options: &ArchiveOptions,
        progress: Option<&ProgressFn>,
    ) -> VaultResult<Vec<u8>> {
        if files.is_empty() {
            return Err(VaultError::Input("no files selected".into()));
        }
        if secret.password().expose_secret().is_empty() {
            return Err(VaultError::Input("password must not be empty".into()));
        }
        options.validate()?;

        let mut phase = PhaseTracker::new("pack");
        let result = self.pack_inner(files, secret, options, progress, &mut phase);
        if let Err(e) = &result {
            warn!(phase = %phase.phase(), error = %e, "archive pack failed");
            phase.fail();
        }
        result
    }

    fn pack_inner(
        &self,
        files: &[InputFile],
        secret: &EncryptionSecret,
        options: &ArchiveOptions,
        progress: Option<&ProgressFn>,
        phase: &mut PhaseTracker,
    ) -> VaultResult<Vec<u8>> {
        let mut progress = ProgressReporter::new(progress);
        progress.report(0);

        phase.advance(OperationPhase::Deriving)?;
        let (archive_salt, archive_key) = match options.variant {
            ArchiveVariant::Standard => (None, None),
            ArchiveVariant::Enhanced { .. } => {
                let mut salt = [0u8; SALT_SIZE];
                self.containers.provider().fill_random(&mut salt)?;
                let key = self.derive_archive_key(secret, &salt)?;
                (Some(salt), Some(key))
            }
        };
        let source = match &archive_key {
            Some(key) => KeySource::Archive(key),
            None => KeySource::Password,
        };
        let payload_compression = match options.variant {
            ArchiveVariant::Enhanced { compression, .. } => Some(compression),
            ArchiveVariant::Standard => None,
        };

        phase.advance(OperationPhase::PerFileLoop)?;
        info!(files = files.len(), variant = ?options.variant, "packing archive");

        let entry_options = options.package_options();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut entry_paths = HashSet::new();
        let mut folders: BTreeMap<String, FolderTally> = BTreeMap::new();
        let mut individual_files = 0usize;
        let mut total_original_size = 0u64;

        for (index, file) in files.iter().enumerate() {
            if file.name.is_empty() {
                return Err(VaultError::Input(format!("file #{index} has no name")));
            }
            let restore_path = if file.relative_path.is_empty() {
                file.name.as_str()
            } else {
                file.relative_path.as_str()
            };
            validate_relative_path(restore_path).map_err(|e| VaultError::Input(e.to_string()))?;

            let data = file.read()?;
            let size = data.len() as u64;
            total_original_size += size;

            let mut metadata = FileMetadata::new(&file.name, size, &file.relative_path)
                .with_filename_encryption(options.filenames.clone())
                .with_last_modified(file.modified_millis());

            let compressed = match &payload_compression {
                Some(settings) => self.compression.compress(&data, settings)?,
                None => None,
            };
            let payload = match compressed {
                Some((packed, marker)) => {
                    metadata.payload_compression = Some(marker);
                    packed
                }
                None => data,
            };

            match file.folder_root() {
                Some(root) => {
                    let tally = folders.entry(root.to_string()).or_default();
                    tally.file_count += 1;
                    tally.total_size += size;
                    tally.files.push(FolderFileEntry {
                        name: file.name.clone(),
                        size,
                        mime_type: metadata.mime_type.clone(),
                        path: file.relative_path.clone(),
                    });
                }
                None => individual_files += 1,
            }

            let packed =
                self.containers
                    .pack_with_key_source(&payload, metadata, secret, source)?;
            let path = entry_path(&file.relative_path, &packed.stored_name);
            if !entry_paths.insert(path.clone()) {
                return Err(VaultError::Input(format!("duplicate archive path {path:?}")));
            }

            writer.start_file(path.as_str(), entry_options).map_err(zip_error)?;
            writer.write_all(&packed.bytes)?;

            debug!(index, size, container = packed.bytes.len(), "packed archive entry");
            progress.file_done(index + 1, files.len());
        }

        phase.advance(OperationPhase::Finalizing)?;
        let manifest_options = deflated(STANDARD_DEFLATE_LEVEL);
        let list_files = options.filenames.mode == FilenameMode::None;

        for (name, tally) in &folders {
            let folder = FolderMetadata {
                name: name.clone(),
                file_count: tally.file_count,
                total_size: tally.total_size,
                files: list_files.then(|| tally.files.clone()),
            };
            let path = format!("{name}/{FOLDER_METADATA_NAME}");
            writer.start_file(path.as_str(), manifest_options).map_err(zip_error)?;
            writer.write_all(&serde_json::to_vec_pretty(&folder)?)?;
        }

        let (compression, solid) = match options.variant {
            ArchiveVariant::Enhanced { compression, solid } => (Some(compression), solid),
            ArchiveVariant::Standard => (None, false),
        };
        let manifest = ArchiveMetadata {
            version: ArchiveMetadata::VERSION.to_string(),
            encryption_method: ArchiveMetadata::ENCRYPTION_METHOD.to_string(),
            total_files: files.len(),
            folders: folders
                .iter()
                .map(|(name, tally)| FolderSummary {
                    name: name.clone(),
                    file_count: tally.file_count,
                })
                .collect(),
            individual_files,
            has_hardware_key: secret.has_hardware(),
            timestamp: now_millis(),
            filename_encryption: options.filenames.clone(),
            total_original_size,
            compression,
            solid,
            salt: archive_salt.map(|s| hex::encode(&s)),
        };
        writer
            .start_file(ARCHIVE_METADATA_NAME, manifest_options)
            .map_err(zip_error)?;
        writer.write_all(&manifest.to_json()?)?;

        let bytes = writer.finish().map_err(zip_error)?.into_inner();
        progress.finish();
        phase.advance(OperationPhase::Done)?;

        info!(
            files = files.len(),
            folders = folders.len(),
            bytes = bytes.len(),
            "archive packed"
        );
        Ok(bytes)
    }

    /// Restore every file from a package.
    pub fn unpack_many(
        &self,
        bytes: &[u8],
        secret: &EncryptionSecret,
        progress: Option<&ProgressFn>,
    ) -> VaultResult<UnpackedArchive> {
        let mut phase = PhaseTracker::new("unpack");
        let result = self.unpack_inner(bytes, secret, progress, &mut phase);
        if let Err(e) = &result {
            warn!(phase = %phase.phase(), error = %e, "archive unpack failed");
            phase.fail();
        }
        result
    }

    fn unpack_inner(
        &self,
        bytes: &[u8],
        secret: &EncryptionSecret,
        progress: Option<&ProgressFn>,
        phase: &mut PhaseTracker,
    ) -> VaultResult<UnpackedArchive> {
        let mut progress = ProgressReporter::new(progress);
        progress.report(0);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
        let manifest = read_manifest_from(&mut archive)?;

        if manifest.has_hardware_key && !secret.has_hardware() {
            return Err(VaultError::HardwareKeyRequired);
        }

        phase.advance(OperationPhase::Deriving)?;
        let archive_key = match &manifest.salt {
            Some(encoded) => {
                let salt = decode_archive_salt(encoded)?;
                Some(self.derive_archive_key(secret, &salt)?)
            }
            None => None,
        };
        let source = match &archive_key {
            Some(key) => KeySource::Archive(key),
            None => KeySource::Password,
        };

        phase.advance(OperationPhase::PerFileLoop)?;
        let total = archive
            .file_names()
            .filter(|name| entry_kind(name) == EntryKind::Container)
            .count();
        info!(entries = total, enhanced = manifest.is_enhanced(), "unpacking archive");

        let names = self.containers.names();
        let mut files = Vec::with_capacity(total);
        let mut folders = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(zip_error)?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            let kind = entry_kind(&entry_name);
            if kind == EntryKind::Skip {
                continue;
            }

            let declared = entry.size();
            let raw = read_entry(&mut entry, declared, bytes.len())?;

            if kind == EntryKind::FolderManifest {
                let folder: FolderMetadata = serde_json::from_slice(&raw).map_err(|e| {
                    VaultError::Format(format!("folder manifest {entry_name:?} unparseable: {e}"))
                })?;
                folders.push(folder);
                continue;
            }

            let unpacked = self
                .containers
                .unpack_with_key_source(&raw, secret, source)?;
            let metadata = unpacked.metadata;
            let data = match &metadata.payload_compression {
                Some(marker) => {
                    self.compression
                        .decompress(&unpacked.data, marker, metadata.original_size)?
                }
                None => unpacked.data,
            };

            let (interior, stored_leaf) = split_parent(&entry_name);
            let fallback = metadata
                .restore_path()
                .rsplit('/')
                .next()
                .unwrap_or_default();
            let leaf = names.reveal(
                stored_leaf,
                secret.password(),
                &manifest.filename_encryption,
                fallback,
            );
            let path = match interior {
                Some(dir) => format!("{dir}/{leaf}"),
                None => leaf,
            };
            validate_relative_path(&path)?;

            debug!(index = files.len(), size = data.len(), "unpacked archive entry");
            files.push(DecryptedFile {
                path,
                data,
                metadata,
            });
            progress.file_done(files.len(), total);
        }

        phase.advance(OperationPhase::Finalizing)?;
        if files.len() != manifest.total_files {
            warn!(
                expected = manifest.total_files,
                found = files.len(),
                "archive entry count differs from manifest"
            );
        }
        progress.finish();
        phase.advance(OperationPhase::Done)?;

        info!(files = files.len(), "archive unpacked");
        Ok(UnpackedArchive {
            files,
            manifest,
            folders,
        })
    }

    /// Read the archive manifest without a password.
    pub fn read_manifest(bytes: &[u8]) -> VaultResult<ArchiveMetadata> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
        read_manifest_from(&mut archive)
    }

    fn derive_archive_key(
        &self,
        secret: &EncryptionSecret,
        salt: &[u8; SALT_SIZE],
    ) -> VaultResult<DerivedKey> {
        derive_key(
            self.containers.provider().as_ref(),
            secret.password(),
            salt,
            self.containers.params(),
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
enum EntryKind {
    Container,
    FolderManifest,
    Skip,
}

fn entry_kind(name: &str) -> EntryKind {
    if name.ends_with('/') || name == ARCHIVE_METADATA_NAME {
        return EntryKind::Skip;
    }
    match split_parent(name) {
        (Some(_), FOLDER_METADATA_NAME) => EntryKind::FolderManifest,
        (None, FOLDER_METADATA_NAME) => EntryKind::Skip,
        _ => EntryKind::Container,
    }
}

fn read_manifest_from<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> VaultResult<ArchiveMetadata> {
    let index = archive
        .index_for_name(ARCHIVE_METADATA_NAME)
        .ok_or_else(|| VaultError::Format("archive manifest missing".into()))?;
    let mut entry = archive.by_index(index).map_err(zip_error)?;
    let mut raw = Vec::new();
    entry.read_to_end(&mut raw)?;
    ArchiveMetadata::from_json(&raw)
}

/// Package path for a container: interior directories of the relative path
/// followed by the stored leaf name.
fn entry_path(relative_path: &str, stored_name: &str) -> String {
    match relative_path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{stored_name}"),
        None => stored_name.to_string(),
    }
}

fn split_parent(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((dir, leaf)) => (Some(dir), leaf),
        None => (None, path),
    }
}

fn zip_error(e: ZipError) -> VaultError {
    match e {
        ZipError::Io(io) => VaultError::Io(io),
        other => VaultError::Format(format!("zip: {other}")),
    }
}

/// Read one package entry without trusting its declared size.
///
/// The header's uncompressed size only bounds the read; the initial buffer
/// never exceeds the size of the package itself.
fn read_entry(entry: impl Read, declared: u64, package_len: usize) -> VaultResult<Vec<u8>> {
    let mut raw = Vec::with_capacity(declared.min(package_len as u64) as usize);
    entry.take(declared).read_to_end(&mut raw)?;
    Ok(raw)
}

fn decode_archive_salt(encoded: &str) -> VaultResult<[u8; SALT_SIZE]> {
    hex::decode(encoded)
        .ok()
        .and_then(|bytes| <[u8; SALT_SIZE]>::try_from(bytes).ok())
        .ok_or_else(|| {
            VaultError::Format(format!("archive salt {encoded:?} is not {SALT_SIZE} hex bytes"))
        })
}
