// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The coordinator interface

use async_trait::async_trait;
use ds_core::protocol::{ProtocolError, WireError};
use ds_core::{LockKey, Notification, TransactionId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Notifications in publish order, ending when the source goes away
pub type NotificationStream = mpsc::UnboundedReceiver<Notification>;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("coordinator unreachable: {0}")]
    Unreachable(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("coordinator error: {0}")]
    Remote(WireError),
    #[error("unexpected response from coordinator")]
    UnexpectedResponse,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AcquireOutcome {
    /// Every requested key is now leased to the caller
    Acquired,
    /// Nothing was acquired; `key` is leased to `holder`
    Busy {
        key: LockKey,
        holder: TransactionId,
    },
}

/// Leased locks plus a notification channel
#[async_trait]
pub trait Coordinator: Send + Sync + 'static {
    /// Lease every key to `holder` for `ttl`, or none of them
    ///
    /// Keys `holder` already leases are renewed. A key conflicts with any
    /// overlapping key leased to someone else.
    async fn acquire(
        &self,
        keys: &[LockKey],
        holder: &TransactionId,
        ttl: Duration,
    ) -> Result<AcquireOutcome, CoordinatorError>;

    /// Drop the leases `holder` owns among `keys`; idempotent
    async fn release(&self, keys: &[LockKey], holder: &TransactionId)
        -> Result<(), CoordinatorError>;

    /// Deliver a notification to every current subscriber
    async fn publish(&self, notification: Notification) -> Result<(), CoordinatorError>;

    async fn subscribe(&self) -> Result<NotificationStream, CoordinatorError>;
}
