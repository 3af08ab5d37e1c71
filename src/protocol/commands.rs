//! Module `commands`
//!
//! Bridge requests and the command set they decode into. A request names a
//! method as `<module>.<name>` and carries positional arguments.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::blob::BlobHandle;
use crate::error::{BridgeError, ErrorCode};
use crate::modules::error_handler::StackFrame;

/// One request line as sent by the JS layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    /// Correlates the completion; requests without one get no completion.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Request {
    pub fn expects_completion(&self) -> bool {
        self.id.is_some()
    }
}

/// Decoded bridge call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // fs
    FsConstants,
    SetEncryptionEnabled(bool),
    Save { blob: BlobHandle, path: String },
    Read(String),
    Move { path: String, new_path: String },
    Remove(String),
    List(String),
    ReadAsDataUrl(String),
    ReadAsText(String),
    FileExists(String),
    WriteJson { data: Value, path: String },
    ReadJson(String),

    // blob
    BlobCreate(Vec<u8>),
    BlobRead(BlobHandle),
    BlobRelease(String),

    // config
    GetConstants,

    // prefs
    GetPreferences,
    SetAppUrl(String),
    SetDevMode(bool),
    SetRemoteDebugging(bool),
    SetDeltas(bool),
    SetElementInspector(bool),
    SetPackagerPort(u16),
    UpdatePackagerHost(String),

    // errorHandler
    HandleError {
        message: Option<String>,
        stack: Vec<StackFrame>,
    },
    HandleRedBox {
        title: Option<String>,
        stack: Vec<StackFrame>,
        kind: String,
    },
}

/// Decodes the request's method and arguments.
///
/// Unknown methods are `ERROR_UNKNOWN_METHOD`; missing or mistyped
/// arguments are `ERROR_INVALID_ARGUMENT`.
pub fn parse_command(request: &Request) -> Result<Command, BridgeError> {
    let args = request.args.as_slice();

    let command = match request.method.as_str() {
        "fs.getConstants" => Command::FsConstants,
        "fs.setEncryptionEnabled" => Command::SetEncryptionEnabled(arg(args, 0, "enabled")?),
        "fs.save" => Command::Save {
            blob: arg(args, 0, "blob")?,
            path: arg(args, 1, "filepath")?,
        },
        "fs.read" => Command::Read(arg(args, 0, "filepath")?),
        "fs.move" => Command::Move {
            path: arg(args, 0, "filepath")?,
            new_path: arg(args, 1, "newPath")?,
        },
        "fs.remove" => Command::Remove(arg(args, 0, "filepath")?),
        "fs.list" => Command::List(arg(args, 0, "dirPath")?),
        "fs.readAsDataURL" => Command::ReadAsDataUrl(arg(args, 0, "filePath")?),
        "fs.readAsText" => Command::ReadAsText(arg(args, 0, "filePath")?),
        "fs.fileExists" => Command::FileExists(arg(args, 0, "filepath")?),
        "fs.writeJson" => Command::WriteJson {
            data: args.first().cloned().unwrap_or(Value::Null),
            path: arg(args, 1, "filepath")?,
        },
        "fs.readJson" => Command::ReadJson(arg(args, 0, "filepath")?),

        "blob.create" => {
            let encoded: String = arg(args, 0, "data")?;
            let bytes = STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| BridgeError::invalid_argument(format!("Invalid argument 'data': {}", e)))?;
            Command::BlobCreate(bytes)
        }
        "blob.read" => Command::BlobRead(arg(args, 0, "blob")?),
        "blob.release" => Command::BlobRelease(arg(args, 0, "blobId")?),

        "config.getConstants" => Command::GetConstants,

        "prefs.get" => Command::GetPreferences,
        "prefs.setAppUrl" => Command::SetAppUrl(arg(args, 0, "url")?),
        "prefs.setDevMode" => Command::SetDevMode(arg(args, 0, "enabled")?),
        "prefs.setRemoteDebugging" => Command::SetRemoteDebugging(arg(args, 0, "enabled")?),
        "prefs.setDeltas" => Command::SetDeltas(arg(args, 0, "enabled")?),
        "prefs.setElementInspector" => Command::SetElementInspector(arg(args, 0, "enabled")?),
        "prefs.setPackagerPort" => Command::SetPackagerPort(arg(args, 0, "port")?),
        "prefs.updatePackagerHost" => Command::UpdatePackagerHost(arg(args, 0, "url")?),

        "errorHandler.handle" => Command::HandleError {
            message: arg(args, 0, "message")?,
            stack: arg::<Option<Vec<StackFrame>>>(args, 1, "stack")?.unwrap_or_default(),
        },
        "errorHandler.handleRedBox" => Command::HandleRedBox {
            title: arg(args, 0, "title")?,
            stack: arg::<Option<Vec<StackFrame>>>(args, 1, "stack")?.unwrap_or_default(),
            kind: arg(args, 2, "errorType")?,
        },

        other => {
            return Err(BridgeError::new(
                ErrorCode::UnknownMethod,
                format!("Unknown method '{}'", other),
            ));
        }
    };

    Ok(command)
}

/// Positional argument `index`; an absent argument reads as null.
fn arg<T: DeserializeOwned>(args: &[Value], index: usize, name: &str) -> Result<T, BridgeError> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| BridgeError::invalid_argument(format!("Invalid argument '{}': {}", name, e)))
}
