//! Native modules exposed over the bridge
//!
//! [`Bridge`] owns one instance of every module plus the shared blob store,
//! and is shared by all connections.

pub mod configuration;
pub mod error_handler;
pub mod fs;
pub mod preferences;

use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::blob::BlobStore;
use crate::config::HostConfig;
use crate::error::HostError;
use crate::storage::{ChaChaFileCipher, FileBackend, FsOptions, MasterKey, PathGuard};

pub use configuration::{ConfigurationModule, DevSupport, LogDevSupport};
pub use error_handler::{LogExceptionReporter, NativeErrorHandler, RedBoxMapper};
pub use fs::NativeFsModule;
pub use preferences::{AppPreferences, JsonFilePreferenceStore};

pub struct Bridge {
    pub fs: NativeFsModule,
    pub configuration: ConfigurationModule,
    pub preferences: AppPreferences,
    pub error_handler: Arc<NativeErrorHandler>,
    pub redbox: RedBoxMapper,
    pub blobs: Arc<BlobStore>,
}

impl Bridge {
    /// Creates the sandbox roots and key material and wires the modules up.
    pub fn from_config(config: &HostConfig) -> Result<Self, HostError> {
        let files_root = prepare_root(config.files_root())?;
        let cache_root = prepare_root(config.cache_root())?;
        info!(
            "Sandbox roots: files={} cache={}",
            files_root.display(),
            cache_root.display()
        );

        let master_key = MasterKey::load_or_create(Path::new(&config.master_key_path))?;
        let backend = FileBackend::new(
            Arc::new(ChaChaFileCipher::new(master_key)),
            FsOptions {
                encryption_enabled: config.encryption_enabled,
                unencrypted_path_markers: config.unencrypted_path_markers.clone(),
            },
        );

        let blobs = Arc::new(BlobStore::new());
        let fs = NativeFsModule::new(
            backend,
            PathGuard::new(&files_root, &cache_root),
            Arc::clone(&blobs),
        );

        let configuration =
            ConfigurationModule::new(config.app.clone(), Arc::new(LogDevSupport));
        let preferences = AppPreferences::new(Box::new(JsonFilePreferenceStore::open(
            &config.preferences_path,
        )?));
        let error_handler = Arc::new(NativeErrorHandler::new(Arc::new(LogExceptionReporter)));
        let redbox = RedBoxMapper::new(error_handler.clone());

        info!(
            "Native modules ready: {}, {} (encryption {}, session {})",
            fs::NAME,
            configuration::NAME,
            if config.encryption_enabled { "on" } else { "off" },
            configuration.session_id()
        );

        Ok(Self {
            fs,
            configuration,
            preferences,
            error_handler,
            redbox,
            blobs,
        })
    }
}

/// Sandbox roots are compared as path prefixes, so they are made absolute.
fn prepare_root(root: PathBuf) -> Result<PathBuf, HostError> {
    std::fs::create_dir_all(&root)?;
    Ok(std::fs::canonicalize(&root)?)
}
