//! vaultpack-archive: many files, one package
//!
//! # Overview
//! - `archive`: zip package of sealed containers plus `_archive_metadata.json`
//!   and per-folder `_folder_metadata.json` manifests
//! - `compress`: optional zstd pass applied to payloads before encryption
//! - `input`: files to pack, held in memory or read from disk on demand
//! - `progress`: monotonic percent reporting
//! - `phase`: per-operation state machine

pub mod archive;
pub mod compress;
pub mod input;
pub mod phase;
pub mod progress;

pub use archive::{ArchiveCodec, ArchiveOptions, ArchiveVariant, DecryptedFile, UnpackedArchive};
pub use compress::CompressionCapability;
pub use input::{FileContents, InputFile};
pub use phase::{OperationPhase, PhaseTracker};
pub use progress::{ProgressFn, ProgressReporter};
