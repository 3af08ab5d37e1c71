//! Developer-mode preferences
//!
//! Launch URL, dev-mode bundle flags and packager settings, kept in an opaque
//! key-value store under the same keys the host runtime reads.

use http::Uri;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StorageError;
use crate::modules::configuration::AppUrl;
use crate::storage::filesystem::write_atomic;

const LAUNCH_URL_KEY: &str = "MX_APP_URL";
const DEV_MODE_KEY: &str = "MX_DEV_MODE";
const REMOTE_DEBUGGING_PACKAGER_PORT: &str = "REMOTE_DEBUGGING_PACKAGER_PORT";
const REACT_NATIVE_SERVER_HOST_KEY: &str = "debug_http_host";
const REACT_NATIVE_REMOTE_JS_DEBUG_KEY: &str = "remote_js_debug";
const PREFS_JS_MINIFY_DEBUG_KEY: &str = "js_minify_debug";
const PREFS_JS_DEV_MODE_DEBUG_KEY: &str = "js_dev_mode_debug";
const PREFS_JS_BUNDLE_DELTAS_KEY: &str = "js_bundle_deltas";
const PREFS_INSPECTOR_DEBUG_KEY: &str = "inspector_debug";

pub const DEFAULT_PACKAGER_PORT: u16 = 8083;

/// Opaque key-value store.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn put(&self, key: &str, value: Value) -> Result<(), StorageError>;

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s,
            _ => default.to_string(),
        }
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
    }
}

/// Store that lives for the process only.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }
}

/// Store persisted as one JSON object, rewritten on every put.
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFilePreferenceStore {
    /// Opens `path`; a missing file starts an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No preferences at {}, starting empty", path.display());
                Map::new()
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value);
        let bytes = serde_json::to_vec_pretty(&*values)?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}

fn lock(values: &Mutex<Map<String, Value>>) -> MutexGuard<'_, Map<String, Value>> {
    values.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Typed view over the developer preference keys.
pub struct AppPreferences {
    store: Box<dyn PreferenceStore>,
}

impl AppPreferences {
    pub fn new(store: Box<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn app_url(&self) -> String {
        self.store.get_string(LAUNCH_URL_KEY, "")
    }

    pub fn set_app_url(&self, app_url: &str) -> Result<(), StorageError> {
        self.put_string(LAUNCH_URL_KEY, AppUrl::ensure_protocol(app_url.trim()))
    }

    pub fn set_remote_debugging(&self, enabled: bool) -> Result<(), StorageError> {
        self.put_bool(REACT_NATIVE_REMOTE_JS_DEBUG_KEY, enabled)
    }

    pub fn is_remote_js_debug_enabled(&self) -> bool {
        self.store.get_bool(REACT_NATIVE_REMOTE_JS_DEBUG_KEY, false)
    }

    /// Dev mode also selects the dev bundle and turns minification off.
    pub fn set_dev_mode(&self, dev_mode: bool) -> Result<(), StorageError> {
        self.put_bool(DEV_MODE_KEY, dev_mode)?;
        self.set_dev_mode_bundle(dev_mode)?;
        self.set_js_minify_bundle(!dev_mode)
    }

    pub fn is_dev_mode_enabled(&self) -> bool {
        self.store.get_bool(DEV_MODE_KEY, false)
    }

    pub fn set_dev_mode_bundle(&self, enabled: bool) -> Result<(), StorageError> {
        self.put_bool(PREFS_JS_DEV_MODE_DEBUG_KEY, enabled)
    }

    pub fn is_dev_mode_bundle_enabled(&self) -> bool {
        self.store.get_bool(PREFS_JS_DEV_MODE_DEBUG_KEY, false)
    }

    pub fn set_js_minify_bundle(&self, enabled: bool) -> Result<(), StorageError> {
        self.put_bool(PREFS_JS_MINIFY_DEBUG_KEY, enabled)
    }

    pub fn is_js_minify_bundle_enabled(&self) -> bool {
        self.store.get_bool(PREFS_JS_MINIFY_DEBUG_KEY, false)
    }

    pub fn set_deltas(&self, enabled: bool) -> Result<(), StorageError> {
        self.put_bool(PREFS_JS_BUNDLE_DELTAS_KEY, enabled)
    }

    pub fn is_deltas_enabled(&self) -> bool {
        self.store.get_bool(PREFS_JS_BUNDLE_DELTAS_KEY, false)
    }

    pub fn set_element_inspector(&self, enabled: bool) -> Result<(), StorageError> {
        self.put_bool(PREFS_INSPECTOR_DEBUG_KEY, enabled)
    }

    pub fn is_element_inspector_enabled(&self) -> bool {
        self.store.get_bool(PREFS_INSPECTOR_DEBUG_KEY, false)
    }

    pub fn set_remote_debugging_packager_port(&self, port: u16) -> Result<(), StorageError> {
        self.store
            .put(REMOTE_DEBUGGING_PACKAGER_PORT, Value::from(port))
    }

    pub fn packager_port(&self) -> u16 {
        let port = self
            .store
            .get_int(REMOTE_DEBUGGING_PACKAGER_PORT, DEFAULT_PACKAGER_PORT as i64);
        u16::try_from(port).unwrap_or(DEFAULT_PACKAGER_PORT)
    }

    /// Falls back to the launch URL when no bundler host was stored.
    pub fn metro_bundler_host(&self) -> String {
        self.store
            .get_string(REACT_NATIVE_SERVER_HOST_KEY, &self.app_url())
    }

    /// Points the bundler host at `app_url`'s host and the packager port.
    /// Returns false when no host can be taken from the URL.
    pub fn update_packager_host(&self, app_url: &str) -> bool {
        let uri = match AppUrl::ensure_protocol(app_url.trim()).parse::<Uri>() {
            Ok(uri) => uri,
            Err(e) => {
                warn!("Cannot derive packager host from {}: {}", app_url, e);
                return false;
            }
        };
        let Some(host) = uri.host() else {
            warn!("No host in {}", app_url);
            return false;
        };

        let bundle_host = AppUrl::for_bundle(host, self.packager_port());
        match self.put_string(REACT_NATIVE_SERVER_HOST_KEY, bundle_host) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to store packager host: {}", e);
                false
            }
        }
    }

    fn put_string(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.store.put(key, Value::String(value))
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.store.put(key, Value::Bool(value))
    }
}
