//! Connection handler
//!
//! Reads request lines from one JS host and dispatches each on the blocking
//! pool as soon as it arrives, so a slow file operation never holds up the
//! requests behind it. Completions are funnelled through a channel to a
//! single writer task and may therefore arrive out of request order.
//!
//! Blobs created for a connection are released when it closes, so read
//! handles the peer never fetched do not outlive it.

use log::{error, info, warn};
use serde_json::Value;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, mpsc};

use crate::blob::BlobOwner;
use crate::client::ClientRegistry;
use crate::error::BridgeError;
use crate::middleware::logging::{log_disconnect, log_request};
use crate::modules::Bridge;
use crate::protocol::process_line;
use crate::protocol::responses::format_error;

/// Completions waiting for the writer before dispatchers start to wait.
const OUTBOUND_QUEUE: usize = 64;

/// Chunk size used while skipping the rest of an oversized line.
const DISCARD_CHUNK: u64 = 64 * 1024;

#[derive(Debug, PartialEq)]
enum LineRead {
    Eof,
    Line(Vec<u8>),
    /// Oversized line, skipped; carries its length in bytes.
    TooLong(usize),
}

/// Serves one connection until the peer closes it, then deregisters it.
pub async fn handle_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    clients: Arc<Mutex<ClientRegistry>>,
    bridge: Arc<Bridge>,
    max_request_length: usize,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let (tx, rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let writer = tokio::spawn(write_completions(write_half, rx, client_addr));
    let owner = bridge.blobs.new_owner();

    loop {
        match read_request_line(&mut reader, max_request_length).await {
            Ok(LineRead::Eof) => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Ok(LineRead::TooLong(len)) => {
                warn!(
                    "Dropping {} byte request from {} (limit {})",
                    len, client_addr, max_request_length
                );
                let error = BridgeError::invalid_argument(format!(
                    "Request exceeds {} bytes",
                    max_request_length
                ));
                if tx.send(format_error(&Value::Null, &error)).await.is_err() {
                    break;
                }
            }
            Ok(LineRead::Line(bytes)) => {
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                if let Some(client) = clients.lock().await.get_mut(&client_addr) {
                    client.record_request();
                }

                let line = match String::from_utf8(bytes) {
                    Ok(line) => line,
                    Err(_) => {
                        let error = BridgeError::invalid_argument("Request is not valid UTF-8");
                        if tx.send(format_error(&Value::Null, &error)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                log_request(client_addr, &line);
                dispatch(Arc::clone(&bridge), line, owner, tx.clone());
            }
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        }
    }

    // The writer finishes only after every in-flight dispatch has dropped
    // its sender, so no blob can be stored for this owner past this point.
    drop(tx);
    if let Err(e) = writer.await {
        error!("Writer for {} stopped abnormally: {}", client_addr, e);
    }

    let released = bridge.blobs.release_owned_by(owner);
    if released > 0 {
        info!("Released {} unclaimed blob(s) of {}", released, client_addr);
    }

    if let Some(client) = clients.lock().await.remove(&client_addr) {
        log_disconnect(&client);
    }
}

fn dispatch(bridge: Arc<Bridge>, line: String, owner: BlobOwner, tx: mpsc::Sender<String>) {
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || process_line(&bridge, &line, owner)).await {
            Ok(Some(completion)) => {
                // A closed writer means the peer is gone; nobody to tell.
                let _ = tx.send(completion).await;
            }
            Ok(None) => {}
            Err(e) => error!("Request handler failed: {}", e),
        }
    });
}

async fn write_completions(
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::Receiver<String>,
    client_addr: SocketAddr,
) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            warn!("Failed to write to {}: {}", client_addr, e);
            // Keep the channel open until the dispatchers are done.
            while rx.recv().await.is_some() {}
            return;
        }
    }
    let _ = write_half.shutdown().await;
}

/// Reads one `\n`-terminated line of at most `max` bytes (terminator
/// excluded). Longer lines are consumed and reported as [`LineRead::TooLong`].
async fn read_request_line<R>(reader: &mut R, max: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = u64::try_from(max).unwrap_or(u64::MAX).saturating_add(1);
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(LineRead::Line(buf));
    }
    if buf.len() <= max {
        // Final line without a terminator.
        return Ok(LineRead::Line(buf));
    }

    let mut skipped = buf.len();
    loop {
        let mut chunk = Vec::new();
        let n = (&mut *reader)
            .take(DISCARD_CHUNK)
            .read_until(b'\n', &mut chunk)
            .await?;
        skipped += n;
        if n == 0 || chunk.last() == Some(&b'\n') {
            break;
        }
    }
    Ok(LineRead::TooLong(skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(input: &[u8], max: usize) -> Vec<LineRead> {
        let mut reader = BufReader::new(input);
        let mut lines = Vec::new();
        loop {
            let line = read_request_line(&mut reader, max).await.unwrap();
            if line == LineRead::Eof {
                break;
            }
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn splits_lines_and_strips_terminators() {
        let lines = read_all(b"one\r\ntwo\nthree", 16).await;
        assert_eq!(
            lines,
            vec![
                LineRead::Line(b"one".to_vec()),
                LineRead::Line(b"two".to_vec()),
                LineRead::Line(b"three".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn oversized_lines_are_skipped_whole() {
        let lines = read_all(b"short\n0123456789abcdef\nnext\n", 8).await;
        assert_eq!(
            lines,
            vec![
                LineRead::Line(b"short".to_vec()),
                LineRead::TooLong(17),
                LineRead::Line(b"next".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn line_of_exactly_the_limit_is_accepted() {
        let lines = read_all(b"12345678\n", 8).await;
        assert_eq!(lines, vec![LineRead::Line(b"12345678".to_vec())]);
    }
}
