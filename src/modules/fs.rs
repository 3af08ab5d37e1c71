//! Native file system module
//!
//! Guards every path, delegates to the file backend and shapes results the
//! way the JS layer expects them: binary reads come back as blob handles,
//! absent files resolve to null, and failures carry one of the bridge error
//! codes.

use base64::{Engine, engine::general_purpose::STANDARD};
use log::{error, info};
use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::blob::{BlobHandle, BlobOwner, BlobStore};
use crate::error::handlers::storage_to_bridge;
use crate::error::{BridgeError, ErrorCode, StorageError};
use crate::storage::{FileBackend, PathGuard};

pub const NAME: &str = "NativeFsModule";

/// MIME type of data URLs for blobs that carry no type of their own.
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

pub type Completion = Result<Value, BridgeError>;

pub struct NativeFsModule {
    backend: FileBackend,
    guard: PathGuard,
    blobs: Arc<BlobStore>,
}

impl NativeFsModule {
    pub fn new(backend: FileBackend, guard: PathGuard, blobs: Arc<BlobStore>) -> Self {
        Self {
            backend,
            guard,
            blobs,
        }
    }

    pub fn backend(&self) -> &FileBackend {
        &self.backend
    }

    /// Constants exposed when the module loads.
    pub fn constants(&self) -> Map<String, Value> {
        let mut constants = Map::new();
        constants.insert(
            "DocumentDirectoryPath".into(),
            Value::String(self.guard.files_root().to_string()),
        );
        // Clients check these before relying on the matching feature.
        constants.insert("SUPPORTS_DIRECTORY_MOVE".into(), Value::Bool(true));
        constants.insert("SUPPORTS_ENCRYPTION".into(), Value::Bool(true));
        constants
    }

    pub fn set_encryption_enabled(&self, enabled: bool) {
        self.backend.set_encryption_enabled(enabled);
    }

    /// Writes the blob's bytes to `path`. The blob is released whatever the
    /// outcome, including a rejected path.
    pub fn save(&self, blob: &BlobHandle, path: &str) -> Completion {
        let allowed = self.ensure_allowed(path);
        let bytes = self.blobs.resolve(blob);
        self.blobs.release(&blob.blob_id);

        let path = allowed?;
        let bytes = bytes.ok_or_else(|| {
            BridgeError::new(ErrorCode::InvalidBlob, "The specified blob is invalid")
        })?;

        self.backend
            .save(&bytes, path)
            .map(|_| Value::Null)
            .map_err(|e| storage_to_bridge(e, ErrorCode::CacheFailed, "Failed writing file to disk"))
    }

    /// Reads `path` into the blob store on behalf of `owner` and resolves
    /// with its handle.
    pub fn read(&self, path: &str, owner: BlobOwner) -> Completion {
        let path = self.ensure_allowed(path)?;

        match self.backend.read(path) {
            Ok(data) => Ok(handle_value(&self.blobs.store(owner, data))),
            Err(e) if e.is_not_found() => Ok(Value::Null),
            Err(e) => Err(read_failed(e)),
        }
    }

    /// Moves a file or a directory tree.
    pub fn move_path(&self, path: &str, new_path: &str) -> Completion {
        let from = self.ensure_allowed(path)?;
        let to = self.ensure_allowed(new_path)?;

        if !self.backend.exists(from) {
            return Err(BridgeError::new(ErrorCode::ReadFailed, "File does not exist"));
        }

        let result = if self.backend.is_directory(from) {
            self.backend.move_directory(from, to)
        } else {
            self.backend.move_file(from, to)
        };

        result.map(|_| Value::Null).map_err(|e| {
            error!("Failed to move {} -> {}: {}", from, to, e);
            BridgeError::new(ErrorCode::MoveFailed, e.to_string())
        })
    }

    /// Deletes a file or a directory tree. Absent targets succeed.
    pub fn remove(&self, path: &str) -> Completion {
        let path = self.ensure_allowed(path)?;

        let result = if self.backend.is_directory(path) {
            self.backend.delete_directory(path)
        } else {
            self.backend.delete_file(path)
        };

        result.map(|_| Value::Null).map_err(|e| {
            storage_to_bridge(e, ErrorCode::RemoveFailed, "Failed removing file from disk")
        })
    }

    /// Lists child names of `dir_path`.
    ///
    /// Older clients list without checking that the directory exists and chain
    /// on the result, so an absent or non-directory path resolves to an empty
    /// list before the path is validated at all.
    pub fn list(&self, dir_path: &str) -> Completion {
        // TODO: product review of this pre-validation check, it answers
        // existence questions for paths outside the sandbox.
        if !self.backend.exists(dir_path) || !self.backend.is_directory(dir_path) {
            return Ok(Value::Array(Vec::new()));
        }

        let dir_path = self.ensure_allowed(dir_path)?;
        let names = self.backend.list(dir_path);
        Ok(Value::Array(names.into_iter().map(Value::String).collect()))
    }

    pub fn read_as_data_url(&self, path: &str) -> Completion {
        let path = self.ensure_allowed(path)?;

        match self.backend.read(path) {
            Ok(data) => Ok(Value::String(data_url(DEFAULT_MIME_TYPE, &data))),
            Err(e) if e.is_not_found() => Ok(Value::Null),
            Err(e) => Err(read_failed(e)),
        }
    }

    pub fn read_as_text(&self, path: &str) -> Completion {
        let path = self.ensure_allowed(path)?;

        match self.backend.read(path) {
            Ok(data) => Ok(Value::String(String::from_utf8_lossy(&data).into_owned())),
            Err(e) if e.is_not_found() => Ok(Value::Null),
            Err(e) => Err(read_failed(e)),
        }
    }

    pub fn file_exists(&self, path: &str) -> Completion {
        let path = self.ensure_allowed(path)?;
        Ok(Value::Bool(self.backend.exists(path)))
    }

    /// Serializes `data` (which must be a JSON object) to `path`.
    pub fn write_json(&self, data: &Value, path: &str) -> Completion {
        let path = self.ensure_allowed(path)?;

        let map = data.as_object().ok_or_else(|| {
            BridgeError::new(
                ErrorCode::SerializationFailed,
                "Failed to serialize JSON: expected an object",
            )
        })?;

        self.backend
            .write_json(map, path)
            .map(|_| Value::Null)
            .map_err(|e| storage_to_bridge(e, ErrorCode::CacheFailed, "Failed to write to disk"))
    }

    /// Resolves with the stored object, or with the string `"null"` (not a
    /// JSON null) when nothing is stored at `path`; existing clients rely on
    /// that.
    pub fn read_json(&self, path: &str) -> Completion {
        let path = self.ensure_allowed(path)?;

        match self.backend.read_json(path) {
            Ok(map) => Ok(Value::Object(map)),
            Err(e) if e.is_not_found() => {
                info!("No JSON stored at {}", path);
                Ok(Value::String("null".to_string()))
            }
            Err(StorageError::Serialization(e)) => Err(BridgeError::new(
                ErrorCode::SerializationFailed,
                format!("Failed to deserialize JSON: {}", e),
            )),
            Err(e) => Err(read_failed(e)),
        }
    }

    fn ensure_allowed<'a>(&self, path: &'a str) -> Result<&'a str, BridgeError> {
        self.guard.ensure_allowed(path).map_err(|e| {
            error!("{}", e);
            BridgeError::from(e)
        })
    }
}

fn read_failed(err: StorageError) -> BridgeError {
    storage_to_bridge(err, ErrorCode::ReadFailed, "Failed reading file from disk")
}

/// `data:<mime>;base64,<payload>`
pub fn data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(data))
}

/// Completion value for a blob handle.
pub fn handle_value(handle: &BlobHandle) -> Value {
    json!({
        "blobId": handle.blob_id,
        "offset": handle.offset,
        "size": handle.size,
    })
}
