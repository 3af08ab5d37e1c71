//! File system storage management
//!
//! Handles the sandbox path guard, file operations and payload encryption.

pub mod crypto;
pub mod filesystem;
pub mod operations;
pub mod validation;

pub use crypto::{ChaChaFileCipher, FileCipher, MasterKey};
pub use operations::{FileBackend, FsOptions};
pub use validation::PathGuard;
