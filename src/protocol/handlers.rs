//! Command handlers
//!
//! Dispatches decoded commands to the native modules. Everything here is
//! synchronous; the connection handler runs it on the blocking pool.

use base64::{Engine, engine::general_purpose::STANDARD};
use log::{debug, warn};
use serde_json::{Value, json};

use crate::blob::BlobOwner;
use crate::error::handlers::storage_to_bridge;
use crate::error::{BridgeError, ErrorCode, StorageError};
use crate::modules::Bridge;
use crate::modules::fs::{Completion, handle_value};
use crate::protocol::commands::{Command, parse_command};
use crate::protocol::parser::parse_request;
use crate::protocol::responses::{format_completion, format_error};

/// Dispatches a command to its module. Blobs it creates belong to `owner`.
pub fn handle_command(bridge: &Bridge, command: Command, owner: BlobOwner) -> Completion {
    match command {
        Command::FsConstants => Ok(Value::Object(bridge.fs.constants())),
        Command::SetEncryptionEnabled(enabled) => {
            bridge.fs.set_encryption_enabled(enabled);
            Ok(Value::Null)
        }
        Command::Save { blob, path } => bridge.fs.save(&blob, &path),
        Command::Read(path) => bridge.fs.read(&path, owner),
        Command::Move { path, new_path } => bridge.fs.move_path(&path, &new_path),
        Command::Remove(path) => bridge.fs.remove(&path),
        Command::List(path) => bridge.fs.list(&path),
        Command::ReadAsDataUrl(path) => bridge.fs.read_as_data_url(&path),
        Command::ReadAsText(path) => bridge.fs.read_as_text(&path),
        Command::FileExists(path) => bridge.fs.file_exists(&path),
        Command::WriteJson { data, path } => bridge.fs.write_json(&data, &path),
        Command::ReadJson(path) => bridge.fs.read_json(&path),

        Command::BlobCreate(bytes) => Ok(handle_value(&bridge.blobs.store(owner, bytes))),
        Command::BlobRead(handle) => bridge
            .blobs
            .take(&handle)
            .map(|bytes| Value::String(STANDARD.encode(bytes)))
            .ok_or_else(|| BridgeError::new(ErrorCode::InvalidBlob, "The specified blob is invalid")),
        Command::BlobRelease(blob_id) => Ok(Value::Bool(bridge.blobs.release(&blob_id))),

        Command::GetConstants => bridge
            .configuration
            .get_constants()
            .map(Value::Object)
            .map_err(BridgeError::from),

        Command::GetPreferences => Ok(preferences_snapshot(bridge)),
        Command::SetAppUrl(url) => stored(bridge.preferences.set_app_url(&url)),
        Command::SetDevMode(enabled) => stored(bridge.preferences.set_dev_mode(enabled)),
        Command::SetRemoteDebugging(enabled) => {
            stored(bridge.preferences.set_remote_debugging(enabled))
        }
        Command::SetDeltas(enabled) => stored(bridge.preferences.set_deltas(enabled)),
        Command::SetElementInspector(enabled) => {
            stored(bridge.preferences.set_element_inspector(enabled))
        }
        Command::SetPackagerPort(port) => {
            stored(bridge.preferences.set_remote_debugging_packager_port(port))
        }
        Command::UpdatePackagerHost(url) => {
            Ok(Value::Bool(bridge.preferences.update_packager_host(&url)))
        }

        Command::HandleError { message, stack } => {
            bridge.error_handler.handle(message.as_deref(), &stack);
            Ok(Value::Null)
        }
        Command::HandleRedBox { title, stack, kind } => {
            bridge.redbox.handle_redbox(title.as_deref(), &stack, &kind);
            Ok(Value::Null)
        }
    }
}

/// Handles one request line for the connection identified by `owner`.
/// Returns the completion line, or `None` for requests that carry no id.
pub fn process_line(bridge: &Bridge, line: &str, owner: BlobOwner) -> Option<String> {
    let request = match parse_request(line) {
        Ok(request) => request,
        Err(rejected) => {
            warn!("Rejected request line: {}", rejected.error);
            let id = rejected.id.unwrap_or(Value::Null);
            return Some(format_error(&id, &rejected.error));
        }
    };

    debug!("Dispatching {} (id {:?})", request.method, request.id);
    let completion =
        parse_command(&request).and_then(|command| handle_command(bridge, command, owner));

    if !request.expects_completion() {
        if let Err(e) = completion {
            warn!("{} failed without a caller to notify: {}", request.method, e);
        }
        return None;
    }
    let id = request.id.unwrap_or(Value::Null);
    Some(format_completion(&id, completion))
}

fn stored(result: Result<(), StorageError>) -> Completion {
    result
        .map(|_| Value::Null)
        .map_err(|e| storage_to_bridge(e, ErrorCode::CacheFailed, "Failed to store preference"))
}

fn preferences_snapshot(bridge: &Bridge) -> Value {
    let prefs = &bridge.preferences;
    json!({
        "appUrl": prefs.app_url(),
        "devMode": prefs.is_dev_mode_enabled(),
        "devModeBundle": prefs.is_dev_mode_bundle_enabled(),
        "jsMinifyBundle": prefs.is_js_minify_bundle_enabled(),
        "remoteJsDebug": prefs.is_remote_js_debug_enabled(),
        "deltas": prefs.is_deltas_enabled(),
        "elementInspector": prefs.is_element_inspector_enabled(),
        "packagerPort": prefs.packager_port(),
        "metroBundlerHost": prefs.metro_bundler_host(),
    })
}
