//! File containers: the folders a resolver searches for artifacts.
//!
//! [`FileContainer`] is the seam between the resolver and storage. The
//! built-in [`DirContainer`] wraps one directory on the local filesystem;
//! tests and embedders can supply their own implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::ClipError;

/// A flat collection of named files.
#[async_trait]
pub trait FileContainer: Send + Sync {
    /// Human-readable label used in logs.
    fn label(&self) -> String;

    /// Whether a file with exactly this name exists.
    async fn contains(&self, name: &str) -> bool;

    /// All file names, in the container's native enumeration order.
    async fn names(&self) -> Result<Vec<String>, ClipError>;

    /// Location of `name` for later reading.
    fn locate(&self, name: &str) -> PathBuf;

    /// Read the named file's bytes.
    async fn read(&self, name: &str) -> Result<Vec<u8>, ClipError>;
}

/// A directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirContainer {
    dir: PathBuf,
}

/// Whether `name` names an entry directly inside a container: no path
/// separators, no `.` or `..`, nothing but a final path component.
pub fn is_plain_name(name: &str) -> bool {
    !name.contains(['/', '\\'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

impl DirContainer {
    /// Open `dir`, failing with [`ClipError::MissingSubfolder`] if it is
    /// not a directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ClipError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(crate::metadata::missing_subfolder(&dir));
        }
        Ok(Self { dir })
    }
}

#[async_trait]
impl FileContainer for DirContainer {
    fn label(&self) -> String {
        self.dir.display().to_string()
    }

    async fn contains(&self, name: &str) -> bool {
        if !is_plain_name(name) {
            return false;
        }
        tokio::fs::metadata(self.dir.join(name))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn names(&self) -> Result<Vec<String>, ClipError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| ClipError::io(&self.dir, e))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ClipError::io(&self.dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(names)
    }

    fn locate(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, ClipError> {
        let path = self.locate(name);
        if !is_plain_name(name) {
            return Err(ClipError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a plain file name"),
            ));
        }
        tokio::fs::read(&path)
            .await
            .map_err(|e| ClipError::io(path, e))
    }
}
