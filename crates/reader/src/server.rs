// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP service exposing a [`Reader`]

use std::future::Future;
use std::time::Duration;

use ds_core::protocol::{self, ProtocolError};
use ds_storage::LogStore;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::protocol::{Request, Response};
use crate::reader::Reader;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Accept connections until `shutdown` resolves
pub async fn serve<S, F>(
    listener: TcpListener,
    reader: Reader<S>,
    timeout: Duration,
    shutdown: F,
) -> std::io::Result<()>
where
    S: LogStore,
    F: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "reader listening");
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let reader = reader.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(&reader, stream, timeout).await {
                                warn!(%peer, "connection failed: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("error accepting connection: {}", e),
                }
            }
            _ = &mut shutdown => {
                info!("reader shutting down");
                return Ok(());
            }
        }
    }
}

pub async fn handle_connection<S: LogStore>(
    reader: &Reader<S>,
    stream: TcpStream,
    timeout: Duration,
) -> Result<(), ServerError> {
    let (source, mut sink) = stream.into_split();
    let mut source = BufReader::new(source);

    let request: Request = match protocol::read_message(&mut source, timeout).await {
        Ok(request) => request,
        Err(ProtocolError::ConnectionClosed) => {
            debug!("client disconnected before sending a request");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let response = match request {
        Request::Ping => Response::Pong,
        Request::Position => Response::Position {
            position: reader.known_position(),
        },
        Request::Query { query, consistency } => match reader.query(query, consistency).await {
            Ok(result) => Response::Result { result },
            Err(e) => {
                debug!(kind = e.kind(), "query failed: {}", e);
                Response::Error { error: e.to_wire() }
            }
        },
    };
    protocol::write_message(&mut sink, &response, timeout).await?;
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
