//! Blob handles
//!
//! Large payloads cross the bridge as (id, offset, size) references into a
//! shared arena instead of travelling inline.

pub mod store;

pub use store::{BlobHandle, BlobOwner, BlobStore};
