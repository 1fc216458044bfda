//! TCP server for the JSON API.
//!
//! Accepts connections until shutdown is signalled, then stops accepting,
//! gives open connections a grace period to finish the request they are
//! running, and aborts whatever is left.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::api::handlers::Api;
use crate::api::staging::MAX_UPLOAD_SIZE;
use crate::api::{ApiError, ApiResponse, Request};

/// Longest accepted request line: a maximum-size upload in base64 plus
/// room for the rest of the request object.
pub const MAX_LINE_LENGTH: usize = (MAX_UPLOAD_SIZE as usize / 3 + 1) * 4 + 64 * 1024;

/// How long open connections get to finish after shutdown is signalled.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Serve the API on `listener` until [`Api::begin_shutdown`] is called.
pub async fn serve(listener: TcpListener, api: Arc<Api>) {
    let mut shutdown = api.shutdown_signal();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("API connection from {}", peer);
                        let api = Arc::clone(&api);
                        let stop = api.shutdown_signal();
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, api, stop).await {
                                tracing::warn!("API connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("Failed to accept API connection: {}", e),
                }
            }
            _ = shutdown_requested(&mut shutdown) => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    tracing::info!(
        "API stopped accepting; waiting up to {:?} for {} open connection(s)",
        SHUTDOWN_GRACE,
        connections.len()
    );

    let drain = async { while connections.join_next().await.is_some() {} };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!("Grace period elapsed; aborting {} connection(s)", connections.len());
        connections.shutdown().await;
    }
}

/// Read request lines and answer each with one envelope line.
///
/// Requests on one connection run in order. A request already running when
/// shutdown is signalled is finished and answered before the loop exits.
async fn handle_connection(
    stream: TcpStream,
    api: Arc<Api>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    loop {
        let next = tokio::select! {
            next = framed.next() => next,
            _ = shutdown_requested(&mut shutdown) => break,
        };

        let (response, keep_open) = match next {
            None => break,
            Some(Ok(line)) if line.trim().is_empty() => continue,
            Some(Ok(line)) => match serde_json::from_str::<Request>(&line) {
                Ok(request) => {
                    let api = Arc::clone(&api);
                    let response = tokio::task::spawn_blocking(move || api.handle(request))
                        .await
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                    (response, true)
                }
                Err(e) => (
                    ApiResponse::failure(ApiError::invalid(format!("malformed request: {}", e))),
                    true,
                ),
            },
            // The codec stops yielding lines after an error, so answer and hang up.
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => (
                ApiResponse::failure(ApiError::invalid(format!(
                    "request line exceeds {} bytes",
                    MAX_LINE_LENGTH
                ))),
                false,
            ),
            Some(Err(LinesCodecError::Io(e))) => return Err(e),
        };

        let encoded = serde_json::to_string(&response)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        framed.send(encoded).await.map_err(codec_to_io)?;
        if !keep_open {
            break;
        }
    }
    Ok(())
}

/// Resolves once the shutdown flag is set, or its sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn codec_to_io(err: LinesCodecError) -> io::Error {
    match err {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => {
            io::Error::new(io::ErrorKind::InvalidData, "line too long")
        }
    }
}
