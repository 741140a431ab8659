//! Files handed to [`crate::ArchiveCodec::pack_many`]

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use vaultpack_core::VaultResult;

#[derive(Debug, Clone)]
pub enum FileContents {
    Bytes(Vec<u8>),
    /// Read when the file's turn comes in the per-file loop
    Path(PathBuf),
}

#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    /// `/`-separated path under the selected folder root, first segment is the
    /// root itself; empty for individually selected files
    pub relative_path: String,
    pub contents: FileContents,
    pub last_modified: Option<u64>,
}

impl InputFile {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            relative_path: String::new(),
            contents: FileContents::Bytes(data),
            last_modified: None,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            relative_path: String::new(),
            contents: FileContents::Path(path),
            last_modified: None,
        }
    }

    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = relative_path.into();
        self
    }

    pub fn with_last_modified(mut self, millis: u64) -> Self {
        self.last_modified = Some(millis);
        self
    }

    /// First segment of the relative path, if the file came from a folder
    pub fn folder_root(&self) -> Option<&str> {
        let (root, rest) = self.relative_path.split_once('/')?;
        (!root.is_empty() && !rest.is_empty()).then_some(root)
    }

    pub fn read(&self) -> VaultResult<Vec<u8>> {
        match &self.contents {
            FileContents::Bytes(data) => Ok(data.clone()),
            FileContents::Path(path) => Ok(std::fs::read(path)?),
        }
    }

    /// Explicit timestamp, else the file's mtime for path-backed inputs
    pub fn modified_millis(&self) -> Option<u64> {
        self.last_modified.or_else(|| match &self.contents {
            FileContents::Path(path) => mtime_millis(path),
            FileContents::Bytes(_) => None,
        })
    }
}

fn mtime_millis(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_millis() as u64)
}
