//! Module `state`
//!
//! Per-connection bookkeeping for a connected JS host.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected JS host.
pub struct Client {
    addr: SocketAddr,
    connected_at: Instant,
    requests: u64,
}

impl Client {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connected_at: Instant::now(),
            requests: 0,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of request lines received so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn record_request(&mut self) {
        self.requests += 1;
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
