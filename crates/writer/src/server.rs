// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP service exposing a [`Writer`]

use std::future::Future;
use std::time::Duration;

use ds_coordinator::Coordinator;
use ds_core::protocol::{self, ProtocolError};
use ds_core::IdGen;
use ds_storage::LogStore;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::protocol::{Request, Response};
use crate::writer::Writer;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Accept connections until `shutdown` resolves
///
/// `timeout` bounds reading the request and writing the response; the
/// transaction itself is bounded by the writer's own timeouts.
pub async fn serve<S, C, G, F>(
    listener: TcpListener,
    writer: Writer<S, C, G>,
    timeout: Duration,
    shutdown: F,
) -> std::io::Result<()>
where
    S: LogStore,
    C: Coordinator,
    G: IdGen,
    F: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "writer listening");
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let writer = writer.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(&writer, stream, timeout).await {
                                warn!(%peer, "connection failed: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("error accepting connection: {}", e),
                }
            }
            _ = &mut shutdown => {
                info!("writer shutting down");
                return Ok(());
            }
        }
    }
}

pub async fn handle_connection<S, C, G>(
    writer: &Writer<S, C, G>,
    stream: TcpStream,
    timeout: Duration,
) -> Result<(), ServerError>
where
    S: LogStore,
    C: Coordinator,
    G: IdGen,
{
    let (reader, mut sink) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let request: Request = match protocol::read_message(&mut reader, timeout).await {
        Ok(request) => request,
        Err(ProtocolError::ConnectionClosed) => {
            debug!("client disconnected before sending a request");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let response = handle_request(writer, request).await;
    protocol::write_message(&mut sink, &response, timeout).await?;
    Ok(())
}

async fn handle_request<S, C, G>(writer: &Writer<S, C, G>, request: Request) -> Response
where
    S: LogStore,
    C: Coordinator,
    G: IdGen,
{
    let result = match request {
        Request::Ping => Ok(Response::Pong),
        Request::Write { request } => writer
            .write(request)
            .await
            .map(|position| Response::Written { position }),
        Request::WriteBatch { requests } => writer
            .write_batch(requests)
            .await
            .map(|position| Response::Written { position }),
        Request::ReserveIds { collection, amount } => writer
            .reserve_ids(collection, amount)
            .await
            .map(|ids| Response::Ids { ids }),
        Request::DeleteHistoryInformation => writer
            .delete_history_information()
            .await
            .map(|()| Response::Ok),
        Request::TruncateDb => writer.truncate_db().await.map(|()| Response::Ok),
    };
    result.unwrap_or_else(|e| {
        debug!(kind = e.kind(), "request failed: {}", e);
        Response::Error { error: e.to_wire() }
    })
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
