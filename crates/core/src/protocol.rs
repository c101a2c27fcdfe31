// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-lines framing for service connections
//!
//! One message per line, every read and write bounded by a timeout. Errors
//! cross the wire as [`WireError`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on one encoded message
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("timed out")]
    Timeout,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("message exceeds {MAX_MESSAGE_BYTES} bytes")]
    TooLarge,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structured error returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Stable machine-readable kind, e.g. `lock_conflict`
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Read one message
pub async fn read_message<T, R>(reader: &mut R, timeout: Duration) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    R: AsyncBufRead + Unpin,
{
    let line = tokio::time::timeout(timeout, read_line(reader, MAX_MESSAGE_BYTES))
        .await
        .map_err(|_| ProtocolError::Timeout)??
        .ok_or(ProtocolError::ConnectionClosed)?;
    Ok(serde_json::from_slice(&line)?)
}

/// Read messages without a timeout; `None` once the peer closes
pub async fn next_message<T, R>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    T: DeserializeOwned,
    R: AsyncBufRead + Unpin,
{
    match read_line(reader, MAX_MESSAGE_BYTES).await? {
        Some(line) => Ok(Some(serde_json::from_slice(&line)?)),
        None => Ok(None),
    }
}

/// One line without its terminator, buffering at most `limit + 1` bytes
async fn read_line<R>(reader: &mut R, limit: usize) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let bound = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader).take(bound).read_until(b'\n', &mut line).await?;
    if read == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.len() > limit {
        return Err(ProtocolError::TooLarge);
    }
    Ok(Some(line))
}

/// Write one message and flush
pub async fn write_message<T, W>(
    writer: &mut W,
    message: &T,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(message)?;
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::TooLarge);
    }
    line.push(b'\n');
    tokio::time::timeout(timeout, async {
        writer.write_all(&line).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| ProtocolError::Timeout)??;
    Ok(())
}
