//! Client registry
//!
//! Tracks connected clients and enforces the connection limit.

use crate::client::Client;
use std::collections::HashMap;
use std::net::SocketAddr;

pub struct ClientRegistry {
    clients: HashMap<SocketAddr, Client>,
    max_clients: usize,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Registers `addr` unless the registry is full.
    pub fn try_register(&mut self, addr: SocketAddr) -> bool {
        if self.clients.len() >= self.max_clients {
            return false;
        }
        self.clients.insert(addr, Client::new(addr));
        true
    }

    pub fn remove(&mut self, addr: &SocketAddr) -> Option<Client> {
        self.clients.remove(addr)
    }

    pub fn get_mut(&mut self, addr: &SocketAddr) -> Option<&mut Client> {
        self.clients.get_mut(addr)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn refuses_beyond_capacity() {
        let mut registry = ClientRegistry::new(2);
        assert!(registry.try_register(addr(1)));
        assert!(registry.try_register(addr(2)));
        assert!(!registry.try_register(addr(3)));
        assert_eq!(registry.len(), 2);

        registry.remove(&addr(1));
        assert!(registry.try_register(addr(3)));
    }

    #[test]
    fn counts_requests_per_client() {
        let mut registry = ClientRegistry::new(1);
        registry.try_register(addr(1));
        registry.get_mut(&addr(1)).unwrap().record_request();
        registry.get_mut(&addr(1)).unwrap().record_request();

        let client = registry.remove(&addr(1)).unwrap();
        assert_eq!(client.requests(), 2);
        assert_eq!(client.addr(), addr(1));
        assert!(registry.is_empty());
    }
}
