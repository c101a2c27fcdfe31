// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writer error taxonomy

use ds_coordinator::CoordinatorError;
use ds_core::protocol::WireError;
use ds_core::{LockKey, Position, TransactionId};
use ds_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("lock {key} is held by transaction {holder}")]
    LockConflict { key: LockKey, holder: TransactionId },

    #[error("timed out acquiring locks")]
    LockTimeout,

    #[error("{target} changed at position {position}, after {as_of}")]
    ConcurrencyConflict {
        target: String,
        as_of: Position,
        position: Position,
    },

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("coordinator unavailable: {0}")]
    CoordinatorUnavailable(#[from] CoordinatorError),

    #[error("{0} is only allowed in dev mode")]
    DevModeOnly(&'static str),
}

impl From<StoreError> for WriteError {
    fn from(e: StoreError) -> Self {
        if e.is_unavailable() {
            WriteError::StorageUnavailable(e.to_string())
        } else {
            WriteError::InvalidRequest(e.to_string())
        }
    }
}

impl WriteError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            WriteError::LockConflict { .. } => "lock_conflict",
            WriteError::LockTimeout => "lock_timeout",
            WriteError::ConcurrencyConflict { .. } => "concurrency_conflict",
            WriteError::PreconditionFailed(_) => "precondition_failed",
            WriteError::InvalidRequest(_) => "invalid_request",
            WriteError::StorageUnavailable(_) => "storage_unavailable",
            WriteError::CoordinatorUnavailable(_) => "coordinator_unavailable",
            WriteError::DevModeOnly(_) => "dev_mode_only",
        }
    }

    /// Whether the same request may succeed if retried
    ///
    /// A concurrency conflict needs a re-read first; it is retryable in the
    /// sense that the caller should try again with fresh positions.
    pub fn is_retryable(&self) -> bool {
        match self {
            WriteError::LockConflict { .. }
            | WriteError::LockTimeout
            | WriteError::ConcurrencyConflict { .. }
            | WriteError::StorageUnavailable(_)
            | WriteError::CoordinatorUnavailable(_) => true,
            WriteError::PreconditionFailed(_)
            | WriteError::InvalidRequest(_)
            | WriteError::DevModeOnly(_) => false,
        }
    }

    pub fn to_wire(&self) -> WireError {
        WireError {
            kind: self.kind().to_string(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}
