//! Native bridge host - Entry Point
//!
//! Serves the native modules to a JS layer over a local channel.

use log::info;
use std::process::ExitCode;

use hybrid_native_bridge::error::HostError;
use hybrid_native_bridge::error::handlers::handle_error;
use hybrid_native_bridge::{HostConfig, Server};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching native bridge host...");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            handle_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), HostError> {
    let config = HostConfig::load()?;
    let server = Server::new(config).await?;
    server.start().await;
    Ok(())
}
