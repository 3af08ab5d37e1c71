//! Module `store`
//!
//! Arena of byte buffers that cross the bridge by reference. A handle names a
//! buffer plus a byte window into it; the buffer lives until someone releases
//! it or the connection that owns it goes away.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifies the connection a buffer was stored for.
pub type BlobOwner = u64;

/// Opaque reference to a stored byte payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobHandle {
    pub blob_id: String,
    pub offset: usize,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<u64>,
}

impl BlobHandle {
    pub fn new(blob_id: impl Into<String>, offset: usize, size: usize) -> Self {
        Self {
            blob_id: blob_id.into(),
            offset,
            size,
            name: None,
            mime_type: None,
            last_modified: None,
        }
    }
}

struct Entry {
    data: Arc<[u8]>,
    owner: BlobOwner,
}

/// Shared blob arena; cheap to clone behind an `Arc`.
#[derive(Default)]
pub struct BlobStore {
    blobs: Mutex<HashMap<String, Entry>>,
    next_owner: AtomicU64,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands out a fresh owner id, one per connection. Ids start at 1.
    pub fn new_owner(&self) -> BlobOwner {
        self.next_owner.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Takes `data` on behalf of `owner` and returns a handle covering all
    /// of it.
    pub fn store(&self, owner: BlobOwner, data: Vec<u8>) -> BlobHandle {
        let size = data.len();
        let mut blobs = self.blobs();
        let blob_id = loop {
            let candidate = new_blob_id();
            if !blobs.contains_key(&candidate) {
                break candidate;
            }
        };
        blobs.insert(
            blob_id.clone(),
            Entry {
                data: Arc::from(data),
                owner,
            },
        );
        debug!(
            "Stored blob {} for owner {} ({} bytes, {} live)",
            blob_id,
            owner,
            size,
            blobs.len()
        );
        BlobHandle::new(blob_id, 0, size)
    }

    /// Copies out the window the handle names, or `None` if the id is
    /// unknown or the window falls outside the buffer.
    pub fn resolve(&self, handle: &BlobHandle) -> Option<Vec<u8>> {
        let buffer = self.blobs().get(&handle.blob_id).map(|entry| Arc::clone(&entry.data))?;
        let end = handle.offset.checked_add(handle.size)?;
        if end > buffer.len() {
            warn!(
                "Blob {} window {}..{} exceeds {} bytes",
                handle.blob_id,
                handle.offset,
                end,
                buffer.len()
            );
            return None;
        }
        Some(buffer[handle.offset..end].to_vec())
    }

    /// Resolves the handle and releases its buffer.
    pub fn take(&self, handle: &BlobHandle) -> Option<Vec<u8>> {
        let data = self.resolve(handle)?;
        self.release(&handle.blob_id);
        Some(data)
    }

    /// Drops the buffer; returns whether it was still live.
    pub fn release(&self, blob_id: &str) -> bool {
        let released = self.blobs().remove(blob_id).is_some();
        if released {
            debug!("Released blob {}", blob_id);
        }
        released
    }

    /// Drops every buffer still held for `owner` and returns how many went.
    pub fn release_owned_by(&self, owner: BlobOwner) -> usize {
        let mut blobs = self.blobs();
        let before = blobs.len();
        blobs.retain(|_, entry| entry.owner != owner);
        before - blobs.len()
    }

    pub fn contains(&self, blob_id: &str) -> bool {
        self.blobs().contains_key(blob_id)
    }

    pub fn len(&self) -> usize {
        self.blobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn new_blob_id() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
