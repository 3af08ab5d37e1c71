//! Completion lines
//!
//! Every completion is one JSON object followed by `\n`.

use serde_json::{Value, json};

use crate::error::{BridgeError, ErrorCode};

/// Success completion for request `id`.
pub fn format_result(id: &Value, result: Value) -> String {
    format!("{}\n", json!({ "id": id, "result": result }))
}

/// Rejection for request `id`, carrying the error code and message.
pub fn format_error(id: &Value, error: &BridgeError) -> String {
    format!(
        "{}\n",
        json!({
            "id": id,
            "error": { "code": error.code.as_str(), "message": error.message },
        })
    )
}

pub fn format_completion(id: &Value, completion: Result<Value, BridgeError>) -> String {
    match completion {
        Ok(result) => format_result(id, result),
        Err(error) => format_error(id, &error),
    }
}

/// Sent before closing a connection the host cannot take on.
pub fn format_refusal(reason: &str) -> String {
    format_error(&Value::Null, &BridgeError::new(ErrorCode::Internal, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Value {
        assert!(line.ends_with('\n'));
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn result_line() {
        let line = format_completion(&json!(1), Ok(json!({ "blobId": "b" })));
        assert_eq!(parse(&line), json!({ "id": 1, "result": { "blobId": "b" } }));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn error_line() {
        let error = BridgeError::new(ErrorCode::InvalidPath, "nope");
        let line = format_completion(&json!("r-1"), Err(error));
        assert_eq!(
            parse(&line),
            json!({ "id": "r-1", "error": { "code": "INVALID_PATH", "message": "nope" } })
        );
    }

    #[test]
    fn refusal_line_has_null_id() {
        let value = parse(&format_refusal("Too many clients"));
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], "ERROR_INTERNAL");
    }
}
