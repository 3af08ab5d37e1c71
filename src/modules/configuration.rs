//! App configuration constants
//!
//! Read-only values the JS layer picks up at load time. The runtime URL is
//! normalized here; everything else is passed through from [`AppConfig`].

use log::warn;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::{AppConfig, WarningsFilter};
use crate::error::ConfigurationError;

pub const NAME: &str = "MxConfiguration";

/// Bumped whenever the native side changes in a way the JS bundle has to
/// know about.
pub const NATIVE_BINARY_VERSION: i32 = 30;

/// URL helpers shared with the developer preferences.
pub struct AppUrl;

impl AppUrl {
    /// `url` with an explicit scheme and exactly one trailing `/`.
    pub fn for_runtime(url: &str) -> String {
        format!("{}/", Self::ensure_protocol(Self::remove_trailing_slash(url)))
    }

    pub fn for_bundle(host: &str, port: u16) -> String {
        format!("{}:{}", host, port)
    }

    /// Strips a single trailing `/`.
    pub fn remove_trailing_slash(url: &str) -> &str {
        url.strip_suffix('/').unwrap_or(url)
    }

    /// Prepends `http://` unless the URL already starts with `http://` or `https://`.
    pub fn ensure_protocol(url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        }
    }
}

/// Where developer-facing warnings go (a red box on a device, the log here).
pub trait DevSupport: Send + Sync {
    fn show_warning(&self, title: &str, details: &str);
}

/// Routes developer warnings to the log.
pub struct LogDevSupport;

impl DevSupport for LogDevSupport {
    fn show_warning(&self, title: &str, details: &str) {
        warn!("{} {}", title, details);
    }
}

pub struct ConfigurationModule {
    app: AppConfig,
    session_id: String,
    dev_support: Arc<dyn DevSupport>,
}

impl ConfigurationModule {
    pub fn new(app: AppConfig, dev_support: Arc<dyn DevSupport>) -> Self {
        Self {
            app,
            session_id: new_session_id(),
            dev_support,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The constants map.
    ///
    /// Without a runtime URL the app cannot fetch data: unless warnings are
    /// filtered out entirely the developer is told and an empty map is
    /// returned, otherwise it is a fatal configuration error.
    pub fn get_constants(&self) -> Result<Map<String, Value>, ConfigurationError> {
        let Some(runtime_url) = self.app.runtime_url.as_deref() else {
            if self.app.warnings_filter != WarningsFilter::None {
                self.dev_support.show_warning(
                    "Runtime URL not specified.",
                    "Without the runtime URL, the app cannot retrieve any data.\n\nPlease redeploy the app.",
                );
                return Ok(Map::new());
            }
            return Err(ConfigurationError::RuntimeUrlNotSet);
        };

        let mut constants = Map::new();
        constants.insert(
            "RUNTIME_URL".into(),
            Value::String(AppUrl::for_runtime(runtime_url)),
        );
        constants.insert(
            "APP_NAME".into(),
            self.app
                .app_name
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        constants.insert(
            "DATABASE_NAME".into(),
            Value::String(self.app.database_name.clone()),
        );
        // Deprecated, kept for older clients.
        constants.insert(
            "FILES_DIRECTORY_NAME".into(),
            Value::String(self.app.files_directory_name.clone()),
        );
        constants.insert(
            "WARNINGS_FILTER_LEVEL".into(),
            Value::String(self.app.warnings_filter.to_string()),
        );
        constants.insert("IS_DEVELOPER_APP".into(), Value::Bool(self.app.developer_app));
        constants.insert(
            "NATIVE_BINARY_VERSION".into(),
            Value::from(NATIVE_BINARY_VERSION),
        );
        constants.insert(
            "APP_SESSION_ID".into(),
            Value::String(self.session_id.clone()),
        );
        Ok(constants)
    }
}

fn new_session_id() -> String {
    let bytes: [u8; 16] = rand::random();
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
