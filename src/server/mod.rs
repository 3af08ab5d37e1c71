//! Server core functionality
//!
//! The accept loop of the bridge channel.

pub mod core;

pub use core::Server;
