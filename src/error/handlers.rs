//! Error handlers
//!
//! Logs failures and converts storage errors into tagged bridge rejections.

use crate::error::types::{BridgeError, ErrorCode, HostError, StorageError};
use log::error;

/// Handle a bridge host startup error
pub fn handle_error(err: &HostError) {
    error!("Native bridge host error: {}", err);
}

/// Convert a storage failure into the rejection the JS layer expects.
///
/// `io_code` is the operation's generic failure code (for example
/// `ERROR_CACHE_FAILED` for writes, `ERROR_READ_FAILED` for reads) and
/// `message` the user-facing text that goes with it.
pub fn storage_to_bridge(err: StorageError, io_code: ErrorCode, message: &str) -> BridgeError {
    error!("{}: {}", message, err);
    match err {
        StorageError::Serialization(e) => {
            BridgeError::new(ErrorCode::SerializationFailed, format!("{}: {}", message, e))
        }
        StorageError::MoveFailed { .. } => BridgeError::new(ErrorCode::MoveFailed, err.to_string()),
        _ => BridgeError::new(io_code, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_errors_take_the_operation_code() {
        let err = StorageError::from(io::Error::new(io::ErrorKind::Other, "disk full"));
        let bridged = storage_to_bridge(err, ErrorCode::CacheFailed, "Failed writing file to disk");
        assert_eq!(bridged.code, ErrorCode::CacheFailed);
        assert_eq!(bridged.message, "Failed writing file to disk");
    }

    #[test]
    fn json_errors_are_serialization_failures() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let bridged = storage_to_bridge(
            StorageError::from(json_err),
            ErrorCode::ReadFailed,
            "Failed to deserialize JSON",
        );
        assert_eq!(bridged.code, ErrorCode::SerializationFailed);
        assert_eq!(bridged.code.as_str(), "ERROR_SERIALIZATION_FAILED");
    }
}
