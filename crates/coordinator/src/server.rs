// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP service exposing a [`Coordinator`]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ds_core::protocol::{self, ProtocolError, WireError};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::coordinator::{AcquireOutcome, Coordinator, CoordinatorError};
use crate::protocol::{Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Accept connections until `shutdown` resolves
pub async fn serve<C, F>(
    listener: TcpListener,
    coordinator: Arc<C>,
    timeout: Duration,
    shutdown: F,
) -> std::io::Result<()>
where
    C: Coordinator,
    F: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "coordinator listening");
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let coordinator = Arc::clone(&coordinator);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(coordinator.as_ref(), stream, timeout).await {
                                warn!(%peer, "connection failed: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("error accepting connection: {}", e),
                }
            }
            _ = &mut shutdown => {
                info!("coordinator shutting down");
                return Ok(());
            }
        }
    }
}

/// Serve one request; a subscription keeps the connection open
pub async fn handle_connection<C: Coordinator + ?Sized>(
    coordinator: &C,
    stream: TcpStream,
    timeout: Duration,
) -> Result<(), ServerError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let request: Request = match protocol::read_message(&mut reader, timeout).await {
        Ok(request) => request,
        Err(ProtocolError::ConnectionClosed) => {
            debug!("client disconnected before sending a request");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    debug!(?request, "received request");

    if matches!(request, Request::Subscribe) {
        return stream_notifications(coordinator, &mut writer, timeout).await;
    }

    let response = handle_request(coordinator, request).await;
    protocol::write_message(&mut writer, &response, timeout).await?;
    Ok(())
}

async fn handle_request<C: Coordinator + ?Sized>(coordinator: &C, request: Request) -> Response {
    let result = match request {
        Request::Ping => Ok(Response::Pong),
        Request::Acquire { keys, holder, ttl } => coordinator
            .acquire(&keys, &holder, ttl)
            .await
            .map(|outcome| match outcome {
                AcquireOutcome::Acquired => Response::Acquired,
                AcquireOutcome::Busy { key, holder } => Response::Busy { key, holder },
            }),
        Request::Release { keys, holder } => coordinator
            .release(&keys, &holder)
            .await
            .map(|()| Response::Released),
        Request::Publish { notification } => coordinator
            .publish(notification)
            .await
            .map(|()| Response::Published),
        Request::Subscribe => Ok(Response::Error {
            error: WireError {
                kind: "invalid_request".to_string(),
                message: "subscribe opens its own connection".to_string(),
                retryable: false,
            },
        }),
    };
    result.unwrap_or_else(|e| Response::Error {
        error: unavailable(&e),
    })
}

fn unavailable(error: &CoordinatorError) -> WireError {
    WireError {
        kind: "coordinator_unavailable".to_string(),
        message: error.to_string(),
        retryable: true,
    }
}

async fn stream_notifications<C, W>(
    coordinator: &C,
    writer: &mut W,
    timeout: Duration,
) -> Result<(), ServerError>
where
    C: Coordinator + ?Sized,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut stream = match coordinator.subscribe().await {
        Ok(stream) => stream,
        Err(e) => {
            let response = Response::Error {
                error: unavailable(&e),
            };
            protocol::write_message(writer, &response, timeout).await?;
            return Ok(());
        }
    };
    protocol::write_message(writer, &Response::Subscribed, timeout).await?;
    debug!("subscriber attached");

    while let Some(notification) = stream.recv().await {
        let message = Response::Notification { notification };
        if let Err(e) = protocol::write_message(writer, &message, timeout).await {
            debug!("subscriber detached: {}", e);
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
