//! Logging middleware
//!
//! Connection and request logging for the bridge channel.

use log::{debug, info, warn};
use std::net::SocketAddr;

use crate::client::Client;

/// Log a client connection
pub fn log_connection(client_addr: SocketAddr, connected: usize, max_clients: usize) {
    info!(
        "JS host connected: {} ({}/{} clients)",
        client_addr, connected, max_clients
    );
}

/// Log a refused connection
pub fn log_refusal(client_addr: SocketAddr, max_clients: usize) {
    warn!(
        "Refusing {}: already serving {} clients",
        client_addr, max_clients
    );
}

/// Log a request line, truncated so blob payloads stay out of the log
pub fn log_request(client_addr: SocketAddr, line: &str) {
    const PREVIEW: usize = 120;
    match line.char_indices().nth(PREVIEW) {
        Some((cut, _)) => debug!("{} -> {}... ({} bytes)", client_addr, &line[..cut], line.len()),
        None => debug!("{} -> {}", client_addr, line),
    }
}

/// Log a disconnect with the session totals
pub fn log_disconnect(client: &Client) {
    info!(
        "JS host {} disconnected after {:.1?} ({} requests)",
        client.addr(),
        client.connected_for(),
        client.requests()
    );
}
