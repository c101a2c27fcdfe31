// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for a coordinator service

use async_trait::async_trait;
use ds_core::protocol::{self, ProtocolError};
use ds_core::{LockKey, Notification, TransactionId};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::coordinator::{AcquireOutcome, Coordinator, CoordinatorError, NotificationStream};
use crate::protocol::{Request, Response};

/// [`Coordinator`] reached over TCP; each call is one connection
#[derive(Clone, Debug)]
pub struct RemoteCoordinator {
    addr: String,
    timeout: Duration,
}

impl RemoteCoordinator {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<TcpStream, CoordinatorError> {
        tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| CoordinatorError::Protocol(ProtocolError::Timeout))?
            .map_err(CoordinatorError::from)
    }

    async fn call(&self, request: &Request) -> Result<Response, CoordinatorError> {
        let stream = self.connect().await?;
        let (reader, mut writer) = stream.into_split();
        protocol::write_message(&mut writer, request, self.timeout).await?;
        let mut reader = BufReader::new(reader);
        match protocol::read_message(&mut reader, self.timeout).await? {
            Response::Error { error } => Err(CoordinatorError::Remote(error)),
            response => Ok(response),
        }
    }

    /// Round trip without side effects
    pub async fn ping(&self) -> Result<(), CoordinatorError> {
        match self.call(&Request::Ping).await? {
            Response::Pong => Ok(()),
            _ => Err(CoordinatorError::UnexpectedResponse),
        }
    }
}

#[async_trait]
impl Coordinator for RemoteCoordinator {
    async fn acquire(
        &self,
        keys: &[LockKey],
        holder: &TransactionId,
        ttl: Duration,
    ) -> Result<AcquireOutcome, CoordinatorError> {
        let request = Request::Acquire {
            keys: keys.to_vec(),
            holder: holder.clone(),
            ttl,
        };
        match self.call(&request).await? {
            Response::Acquired => Ok(AcquireOutcome::Acquired),
            Response::Busy { key, holder } => Ok(AcquireOutcome::Busy { key, holder }),
            _ => Err(CoordinatorError::UnexpectedResponse),
        }
    }

    async fn release(
        &self,
        keys: &[LockKey],
        holder: &TransactionId,
    ) -> Result<(), CoordinatorError> {
        let request = Request::Release {
            keys: keys.to_vec(),
            holder: holder.clone(),
        };
        match self.call(&request).await? {
            Response::Released => Ok(()),
            _ => Err(CoordinatorError::UnexpectedResponse),
        }
    }

    async fn publish(&self, notification: Notification) -> Result<(), CoordinatorError> {
        match self.call(&Request::Publish { notification }).await? {
            Response::Published => Ok(()),
            _ => Err(CoordinatorError::UnexpectedResponse),
        }
    }

    async fn subscribe(&self) -> Result<NotificationStream, CoordinatorError> {
        let stream = self.connect().await?;
        let (reader, mut writer) = stream.into_split();
        protocol::write_message(&mut writer, &Request::Subscribe, self.timeout).await?;
        let mut reader = BufReader::new(reader);
        match protocol::read_message(&mut reader, self.timeout).await? {
            Response::Subscribed => {}
            Response::Error { error } => return Err(CoordinatorError::Remote(error)),
            _ => return Err(CoordinatorError::UnexpectedResponse),
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            // Keep the write half open; dropping it would end the stream.
            let _writer = writer;
            loop {
                match protocol::next_message::<Response, _>(&mut reader).await {
                    Ok(Some(Response::Notification { notification })) => {
                        if tx.send(notification).is_err() {
                            return;
                        }
                    }
                    Ok(Some(other)) => debug!(?other, "ignoring message on subscription"),
                    Ok(None) => {
                        debug!("subscription closed by coordinator");
                        return;
                    }
                    Err(e) => {
                        warn!("subscription failed: {}", e);
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
