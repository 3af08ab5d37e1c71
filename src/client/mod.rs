//! Client management
//!
//! Connection state, the client registry and the per-connection handler.

pub mod handler;
pub mod registry;
pub mod state;

pub use handler::handle_client;
pub use registry::ClientRegistry;
pub use state::Client;
