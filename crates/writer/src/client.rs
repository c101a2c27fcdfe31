// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for a writer service

use ds_core::protocol::{self, ProtocolError, WireError};
use ds_core::{Collection, Id, Position};
use std::time::Duration;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::TcpStream;

use crate::protocol::{Request, Response};
use crate::request::WriteRequest;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("writer unreachable: {0}")]
    Unreachable(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The writer refused the request
    #[error("{0}")]
    Rejected(WireError),
    #[error("unexpected response from writer")]
    UnexpectedResponse,
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Rejected(error) => error.retryable,
            ClientError::UnexpectedResponse => false,
            ClientError::Unreachable(_) | ClientError::Protocol(_) => true,
        }
    }
}

/// Writer reached over TCP; each call is one connection
#[derive(Clone, Debug)]
pub struct WriterClient {
    addr: String,
    timeout: Duration,
}

impl WriterClient {
    /// `timeout` bounds the whole round trip, transaction included
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

    pub async fn write(&self, request: WriteRequest) -> Result<Position, ClientError> {
        match self.call(&Request::Write { request }).await? {
            Response::Written { position } => Ok(position),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn write_batch(&self, requests: Vec<WriteRequest>) -> Result<Position, ClientError> {
        match self.call(&Request::WriteBatch { requests }).await? {
            Response::Written { position } => Ok(position),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn reserve_ids(
        &self,
        collection: Collection,
        amount: u32,
    ) -> Result<Vec<Id>, ClientError> {
        match self.call(&Request::ReserveIds { collection, amount }).await? {
            Response::Ids { ids } => Ok(ids),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn delete_history_information(&self) -> Result<(), ClientError> {
        match self.call(&Request::DeleteHistoryInformation).await? {
            Response::Ok => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn truncate_db(&self) -> Result<(), ClientError> {
        match self.call(&Request::TruncateDb).await? {
            Response::Ok => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}
