//! Path validation
//!
//! Whitelists the two sandbox roots. Matching is a plain string prefix test;
//! no symlink resolution or `..` collapsing happens here, so callers that need
//! real isolation must canonicalize before asking.

use std::path::Path;

use crate::error::PathNotAccessible;

/// Accepts paths under the app-private files root or the cache root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    files_root: String,
    cache_root: String,
}

impl PathGuard {
    /// Both roots are resolved once, at startup.
    pub fn new(files_root: impl AsRef<Path>, cache_root: impl AsRef<Path>) -> Self {
        Self {
            files_root: files_root.as_ref().to_string_lossy().into_owned(),
            cache_root: cache_root.as_ref().to_string_lossy().into_owned(),
        }
    }

    pub fn files_root(&self) -> &str {
        &self.files_root
    }

    /// Returns the path unchanged if it starts with either root.
    pub fn ensure_allowed<'a>(&self, path: &'a str) -> Result<&'a str, PathNotAccessible> {
        if path.starts_with(&self.files_root) || path.starts_with(&self.cache_root) {
            Ok(path)
        } else {
            Err(PathNotAccessible::new(path))
        }
    }
}
