//! Request line parsing
//!
//! Turns one line from the channel into a [`Request`], keeping hold of the
//! id of a malformed request when one can still be read so the rejection
//! can be correlated.

use serde_json::Value;

use crate::error::BridgeError;
use crate::protocol::commands::Request;

/// A line that did not decode into a request.
#[derive(Debug, PartialEq)]
pub struct RejectedRequest {
    pub id: Option<Value>,
    pub error: BridgeError,
}

pub fn parse_request(line: &str) -> Result<Request, RejectedRequest> {
    let value: Value = serde_json::from_str(line.trim()).map_err(|e| RejectedRequest {
        id: None,
        error: BridgeError::invalid_argument(format!("Malformed request: {}", e)),
    })?;

    let id = value.get("id").filter(|id| !id.is_null()).cloned();

    serde_json::from_value(value).map_err(|e| RejectedRequest {
        id,
        error: BridgeError::invalid_argument(format!("Malformed request: {}", e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn parses_a_full_request() {
        let request =
            parse_request(r#"{"id": 7, "method": "fs.read", "args": ["/f/a"]}"#).unwrap();
        assert_eq!(request.id, Some(json!(7)));
        assert_eq!(request.method, "fs.read");
        assert_eq!(request.args, vec![json!("/f/a")]);
    }

    #[test]
    fn id_and_args_are_optional() {
        let request = parse_request(r#"{"method": "config.getConstants"}"#).unwrap();
        assert_eq!(request.id, None);
        assert!(request.args.is_empty());

        let request = parse_request(r#"{"id": null, "method": "x.y"}"#).unwrap();
        assert_eq!(request.id, None);

        let request = parse_request(r#"{"id": "abc", "method": "x.y"}"#).unwrap();
        assert_eq!(request.id, Some(json!("abc")));
    }

    #[test]
    fn garbage_is_rejected_without_an_id() {
        let rejected = parse_request("not json").unwrap_err();
        assert_eq!(rejected.id, None);
        assert_eq!(rejected.error.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn malformed_request_keeps_its_id() {
        let rejected = parse_request(r#"{"id": 3, "args": []}"#).unwrap_err();
        assert_eq!(rejected.id, Some(json!(3)));
        assert_eq!(rejected.error.code, ErrorCode::InvalidArgument);
    }
}
