//! Error types
//!
//! Defines domain-specific error types for each module of the native bridge.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Raised by the path guard when a path lies outside both sandbox roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNotAccessible {
    path: String,
}

impl PathNotAccessible {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The rejected path, exactly as the caller supplied it.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for PathNotAccessible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot write to {}. Path needs to be an absolute path to the apps accessible space.",
            self.path
        )
    }
}

impl std::error::Error for PathNotAccessible {}

/// Cipher errors
#[derive(Debug)]
pub enum CryptoError {
    InvalidKey(String),
    EncryptionFailed(String),
    DecryptionFailed(String),
    MalformedPayload,
    KeyStore(io::Error),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            CryptoError::EncryptionFailed(msg) => write!(f, "Encryption failed: {}", msg),
            CryptoError::DecryptionFailed(msg) => write!(f, "Decryption failed: {}", msg),
            CryptoError::MalformedPayload => write!(f, "Payload is not an encrypted envelope"),
            CryptoError::KeyStore(e) => write!(f, "Key store error: {}", e),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Storage module errors
#[derive(Debug)]
pub enum StorageError {
    NotFound(PathBuf),
    MoveFailed { from: PathBuf, to: PathBuf, source: io::Error },
    Serialization(serde_json::Error),
    Crypto(CryptoError),
    IoError(io::Error),
}

impl StorageError {
    /// True when the failure only means "nothing stored at that path".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(p) => write!(f, "File not found: {}", p.display()),
            StorageError::MoveFailed { from, to, source } => write!(
                f,
                "Failed to move {} to {}: {}",
                from.display(),
                to.display(),
                source
            ),
            StorageError::Serialization(e) => write!(f, "JSON error: {}", e),
            StorageError::Crypto(e) => write!(f, "Crypto error: {}", e),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::MoveFailed { source, .. } => Some(source),
            StorageError::Serialization(e) => Some(e),
            StorageError::Crypto(e) => Some(e),
            StorageError::IoError(e) => Some(e),
            StorageError::NotFound(_) => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        StorageError::Serialization(error)
    }
}

impl From<CryptoError> for StorageError {
    fn from(error: CryptoError) -> Self {
        StorageError::Crypto(error)
    }
}

/// Configuration module errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    RuntimeUrlNotSet,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::RuntimeUrlNotSet => {
                write!(f, "Runtime URL not set in the MxConfiguration")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Error codes the JS layer switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidBlob,
    CacheFailed,
    ReadFailed,
    MoveFailed,
    RemoveFailed,
    SerializationFailed,
    InvalidPath,
    InvalidArgument,
    UnknownMethod,
    Configuration,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidBlob => "ERROR_INVALID_BLOB",
            ErrorCode::CacheFailed => "ERROR_CACHE_FAILED",
            ErrorCode::ReadFailed => "ERROR_READ_FAILED",
            ErrorCode::MoveFailed => "ERROR_MOVE_FAILED",
            ErrorCode::RemoveFailed => "ERROR_REMOVE_FAILED",
            ErrorCode::SerializationFailed => "ERROR_SERIALIZATION_FAILED",
            ErrorCode::InvalidPath => "INVALID_PATH",
            ErrorCode::InvalidArgument => "ERROR_INVALID_ARGUMENT",
            ErrorCode::UnknownMethod => "ERROR_UNKNOWN_METHOD",
            ErrorCode::Configuration => "ERROR_CONFIGURATION",
            ErrorCode::Internal => "ERROR_INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged rejection delivered through the completion channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
}

impl BridgeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BridgeError {}

impl From<PathNotAccessible> for BridgeError {
    fn from(error: PathNotAccessible) -> Self {
        BridgeError::new(ErrorCode::InvalidPath, error.to_string())
    }
}

impl From<ConfigurationError> for BridgeError {
    fn from(error: ConfigurationError) -> Self {
        BridgeError::new(ErrorCode::Configuration, error.to_string())
    }
}

/// Startup failures of the bridge host
#[derive(Debug)]
pub enum HostError {
    Config(config::ConfigError),
    Storage(StorageError),
    Crypto(CryptoError),
    IoError(io::Error),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Config(e) => write!(f, "Configuration error: {}", e),
            HostError::Storage(e) => write!(f, "Storage error: {}", e),
            HostError::Crypto(e) => write!(f, "Crypto error: {}", e),
            HostError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for HostError {}

impl From<config::ConfigError> for HostError {
    fn from(error: config::ConfigError) -> Self {
        HostError::Config(error)
    }
}

impl From<StorageError> for HostError {
    fn from(error: StorageError) -> Self {
        HostError::Storage(error)
    }
}

impl From<CryptoError> for HostError {
    fn from(error: CryptoError) -> Self {
        HostError::Crypto(error)
    }
}

impl From<io::Error> for HostError {
    fn from(error: io::Error) -> Self {
        HostError::IoError(error)
    }
}
