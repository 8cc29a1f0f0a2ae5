//! ALFA Face Vault - Secure Filesystem Operations
//!
//! Atomic writes, shredding deletes and the protected-file naming scheme.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Max 1MB per wipe write
const WIPE_CHUNK: usize = 1024 * 1024;

/// Secure filesystem handler
#[derive(Debug, Clone)]
pub struct SecureFs {
    /// Suffix appended to protected files
    suffix: String,
}

impl SecureFs {
    pub fn new(suffix: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// `report.pdf` -> `report.pdf.enc`
    pub fn protected_path(&self, original: &Path) -> PathBuf {
        append_to_path(original, &self.suffix)
    }

    /// Identifier a path is stored under in the key vault.
    ///
    /// Only UTF-8 paths are accepted so the same string comes back when the
    /// suffix is stripped on decrypt.
    pub fn path_id<'a>(&self, path: &'a Path) -> VaultResult<&'a str> {
        path.to_str()
            .ok_or_else(|| VaultError::InvalidPath(path.display().to_string()))
    }

    /// `report.pdf.enc` -> `report.pdf`; `None` if the suffix is missing
    pub fn original_path(&self, protected: &Path) -> Option<PathBuf> {
        let raw = protected.to_str()?;
        raw.strip_suffix(self.suffix.as_str())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    /// Read file contents
    pub fn read_file(&self, path: &Path) -> VaultResult<Vec<u8>> {
        let mut file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VaultError::FileNotFound(path.display().to_string()),
            _ => VaultError::Io(e),
        })?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Write file atomically: temp file, fsync, rename.
    ///
    /// The temp file is removed if any step fails.
    pub fn write_file(&self, path: &Path, data: &[u8]) -> VaultResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = append_to_path(path, ".tmp");
        let result = write_and_rename(&temp_path, path, data);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    /// Overwrite with zeros, then delete.
    ///
    /// A symlink is unlinked without touching the file it points to.
    pub fn delete_file(&self, path: &Path) -> VaultResult<()> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if metadata.is_file() && metadata.len() > 0 {
            let mut file = OpenOptions::new().write(true).open(path)?;
            let zeros = vec![0u8; WIPE_CHUNK];
            let mut remaining = metadata.len();
            while remaining > 0 {
                let to_write = remaining.min(WIPE_CHUNK as u64) as usize;
                file.write_all(&zeros[..to_write])?;
                remaining -= to_write as u64;
            }
            file.sync_all()?;
        }

        fs::remove_file(path)?;
        Ok(())
    }
}

fn write_and_rename(temp_path: &Path, path: &Path, data: &[u8]) -> VaultResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)?;

    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, path)?;
    Ok(())
}

fn append_to_path(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}
