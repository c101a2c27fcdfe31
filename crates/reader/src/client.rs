// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for a reader service

use ds_core::protocol::{self, ProtocolError, WireError};
use ds_core::Position;
use std::time::Duration;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::TcpStream;

use crate::protocol::{Request, Response};
use crate::query::{Consistency, Query, QueryResult};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("reader unreachable: {0}")]
    Unreachable(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("{0}")]
    Rejected(WireError),
    #[error("unexpected response from reader")]
    UnexpectedResponse,
}

/// Reader reached over TCP; each call is one connection
#[derive(Clone, Debug)]
pub struct ReaderClient {
    addr: String,
    timeout: Duration,
}

impl ReaderClient {
    /// `timeout` must cover the reader's own wait for lagging positions
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    async fn call(&self, request: &Request) -> Result<Response, ClientError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        let (reader, mut writer) = stream.into_split();
        protocol::write_message(&mut writer, request, self.timeout).await?;
        let mut reader = BufReader::new(reader);
        match protocol::read_message(&mut reader, self.timeout).await? {
            Response::Error { error } => Err(ClientError::Rejected(error)),
            response => Ok(response),
        }
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.call(&Request::Ping).await? {
            Response::Pong => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn position(&self) -> Result<Position, ClientError> {
        match self.call(&Request::Position).await? {
            Response::Position { position } => Ok(position),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn query(
        &self,
        query: Query,
        consistency: Consistency,
    ) -> Result<QueryResult, ClientError> {
        match self.call(&Request::Query { query, consistency }).await? {
            Response::Result { result } => Ok(result),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}
