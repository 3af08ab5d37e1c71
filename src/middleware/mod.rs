//! Server middleware
//!
//! Logging helpers shared by the accept loop and the connection handler.

pub mod logging;
