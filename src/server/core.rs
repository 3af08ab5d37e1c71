use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::client::{ClientRegistry, handle_client};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::middleware::logging::{log_connection, log_refusal};
use crate::modules::Bridge;
use crate::protocol::responses::format_refusal;

pub struct Server {
    client_registry: Arc<Mutex<ClientRegistry>>,
    bridge: Arc<Bridge>,
    listener: TcpListener,
    config: Arc<HostConfig>,
}

impl Server {
    /// Prepares the native modules and binds the bridge channel.
    pub async fn new(config: HostConfig) -> Result<Self, HostError> {
        let bridge = Bridge::from_config(&config)?;

        let socket = config.listen_socket();
        let listener = TcpListener::bind(&socket).await.map_err(|e| {
            error!("Failed to bind to {}: {}", socket, e);
            HostError::IoError(e)
        })?;
        info!("Bridge channel bound to {}", socket);

        Ok(Self {
            client_registry: Arc::new(Mutex::new(ClientRegistry::new(config.max_clients))),
            bridge: Arc::new(bridge),
            listener,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub async fn start(&self) {
        info!(
            "Starting native bridge host on {} (max {} clients)",
            self.config.listen_socket(),
            self.config.max_clients
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let client_registry = Arc::clone(&self.client_registry);
                    let bridge = Arc::clone(&self.bridge);
                    let max_request_length = self.config.max_request_length;

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        if let Err(e) = handle_new_client(
                            stream,
                            addr,
                            client_registry,
                            bridge,
                            max_request_length,
                        )
                        .await
                        {
                            warn!("Failed to handle client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Registers the client, or refuses it when the host is at capacity.
async fn handle_new_client(
    mut stream: TcpStream,
    client_addr: SocketAddr,
    client_registry: Arc<Mutex<ClientRegistry>>,
    bridge: Arc<Bridge>,
    max_request_length: usize,
) -> Result<(), io::Error> {
    {
        let mut clients = client_registry.lock().await;
        if !clients.try_register(client_addr) {
            log_refusal(client_addr, clients.max_clients());
            drop(clients);
            stream
                .write_all(format_refusal("Too many connections. Try again later.").as_bytes())
                .await?;
            stream.shutdown().await?;
            return Ok(());
        }
        log_connection(client_addr, clients.len(), clients.max_clients());
    }

    handle_client(
        stream,
        client_addr,
        client_registry,
        bridge,
        max_request_length,
    )
    .await;

    Ok(())
}
