//! Storage operations
//!
//! The file backend: read, write, move, delete and list against the real
//! filesystem, with optional transparent encryption. Paths arrive already
//! validated by the path guard.

use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::StorageError;
use crate::storage::crypto::FileCipher;
use crate::storage::filesystem::{
    copy_tree, create_parent_dirs, remove_dir_if_exists, remove_file_if_exists, write_atomic,
};

/// Construction-time options of the file backend.
#[derive(Debug, Clone, Default)]
pub struct FsOptions {
    /// Initial state of the encryption flag.
    pub encryption_enabled: bool,
    /// Paths containing any of these markers are never encrypted.
    pub unencrypted_path_markers: Vec<String>,
}

/// Performs file operations on behalf of the bridge module.
///
/// The encryption flag only affects later calls; files already on disk are
/// never rewritten when it changes.
pub struct FileBackend {
    cipher: Arc<dyn FileCipher>,
    encryption_enabled: AtomicBool,
    unencrypted_path_markers: Vec<String>,
}

impl FileBackend {
    pub fn new(cipher: Arc<dyn FileCipher>, options: FsOptions) -> Self {
        Self {
            cipher,
            encryption_enabled: AtomicBool::new(options.encryption_enabled),
            unencrypted_path_markers: options.unencrypted_path_markers,
        }
    }

    pub fn set_encryption_enabled(&self, enabled: bool) {
        info!("File encryption {}", if enabled { "enabled" } else { "disabled" });
        self.encryption_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_encryption_enabled(&self) -> bool {
        self.encryption_enabled.load(Ordering::SeqCst)
    }

    /// Writes `data` to `path`, replacing existing content.
    pub fn save(&self, data: &[u8], path: &str) -> Result<(), StorageError> {
        if self.is_encryption_enabled() && !self.is_unencrypted_path(path) {
            let sealed = self.cipher.encrypt(data)?;
            write_atomic(Path::new(path), &sealed)?;
        } else {
            write_atomic(Path::new(path), data)?;
        }
        debug!("Saved {} bytes to {}", data.len(), path);
        Ok(())
    }

    /// Reads the content at `path`.
    ///
    /// With encryption enabled, content that does not open as an envelope is
    /// returned as stored, so plain files written earlier stay readable.
    pub fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let stored = read_bytes(path)?;
        if !self.is_encryption_enabled() {
            return Ok(stored);
        }

        match self.cipher.decrypt(&stored) {
            Ok(plain) => Ok(plain),
            Err(e) => {
                debug!("Reading {} as plain content: {}", path, e);
                Ok(stored)
            }
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    pub fn is_directory(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    /// Moves a single file, falling back to copy + delete when rename fails.
    pub fn move_file(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let src = Path::new(from);
        let dst = Path::new(to);

        if !src.is_file() {
            return Err(StorageError::NotFound(src.to_path_buf()));
        }

        create_parent_dirs(dst).map_err(|e| move_failed(src, dst, e))?;

        if let Err(e) = fs::rename(src, dst) {
            warn!("Rename {} -> {} failed ({}), copying instead", from, to, e);
            let data = read_bytes(from)?;
            write_atomic(dst, &data).map_err(|e| move_failed(src, dst, e))?;
            fs::remove_file(src).map_err(|e| move_failed(src, dst, e))?;
        }

        info!("Moved file {} -> {}", from, to);
        Ok(())
    }

    /// Moves a directory tree, replacing anything already at `to`.
    ///
    /// Moving onto itself is a no-op; moving into its own subtree fails
    /// before anything is touched.
    pub fn move_directory(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let src = Path::new(from);
        let dst = Path::new(to);

        if !src.is_dir() {
            return Err(StorageError::NotFound(src.to_path_buf()));
        }
        if dst == src {
            debug!("Directory {} moved onto itself, nothing to do", from);
            return Ok(());
        }
        // Checked before the destination is cleared.
        if dst.starts_with(src) {
            return Err(move_failed(
                src,
                dst,
                io::Error::new(
                    ErrorKind::InvalidInput,
                    "destination lies inside the source directory",
                ),
            ));
        }

        create_parent_dirs(dst).map_err(|e| move_failed(src, dst, e))?;
        if dst.is_dir() {
            remove_dir_if_exists(dst).map_err(|e| move_failed(src, dst, e))?;
        } else {
            remove_file_if_exists(dst).map_err(|e| move_failed(src, dst, e))?;
        }

        if let Err(e) = fs::rename(src, dst) {
            warn!("Rename {} -> {} failed ({}), copying tree instead", from, to, e);
            copy_tree(src, dst).map_err(|e| move_failed(src, dst, e))?;
            fs::remove_dir_all(src).map_err(|e| move_failed(src, dst, e))?;
        }

        info!("Moved directory {} -> {}", from, to);
        Ok(())
    }

    /// Deletes a file; absent files count as deleted.
    pub fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        remove_file_if_exists(Path::new(path))?;
        debug!("Deleted file {}", path);
        Ok(())
    }

    /// Deletes a directory and everything below it; absent directories count as deleted.
    pub fn delete_directory(&self, path: &str) -> Result<(), StorageError> {
        remove_dir_if_exists(Path::new(path))?;
        debug!("Deleted directory {}", path);
        Ok(())
    }

    /// Child basenames of `path`, sorted. Empty for anything that is not a
    /// readable directory.
    pub fn list(&self, path: &str) -> Vec<String> {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Listing {} yields nothing: {}", path, e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn write_json(&self, map: &Map<String, Value>, path: &str) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(map)?;
        self.save(&bytes, path)
    }

    pub fn read_json(&self, path: &str) -> Result<Map<String, Value>, StorageError> {
        let bytes = self.read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn is_unencrypted_path(&self, path: &str) -> bool {
        self.unencrypted_path_markers
            .iter()
            .any(|marker| !marker.is_empty() && path.contains(marker.as_str()))
    }
}

fn read_bytes(path: &str) -> Result<Vec<u8>, StorageError> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound(path.into()),
        _ => {
            error!("Failed to read {}: {}", path, e);
            StorageError::IoError(e)
        }
    })
}

fn move_failed(from: &Path, to: &Path, source: io::Error) -> StorageError {
    StorageError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}
