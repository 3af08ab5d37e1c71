//! Native bridge modules for a hybrid app runtime
//!
//! Sandboxed and optionally encrypted file access, app configuration
//! constants, developer preferences and JS error reporting, plus a small host
//! that serves them over a newline-delimited JSON channel.

pub mod blob;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod modules;
pub mod protocol;
pub mod server;
pub mod storage;

pub use config::HostConfig;
pub use modules::Bridge;
pub use server::Server;
