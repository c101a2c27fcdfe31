// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reader error taxonomy

use ds_core::protocol::WireError;
use ds_core::Position;
use ds_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("timed out waiting for position {required}, known position is {known}")]
    TimeoutWaitingForPosition { required: Position, known: Position },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<StoreError> for ReadError {
    fn from(e: StoreError) -> Self {
        if e.is_unavailable() {
            ReadError::StorageUnavailable(e.to_string())
        } else {
            ReadError::InvalidRequest(e.to_string())
        }
    }
}

impl ReadError {
    pub fn kind(&self) -> &'static str {
        match self {
            ReadError::TimeoutWaitingForPosition { .. } => "timeout_waiting_for_position",
            ReadError::StorageUnavailable(_) => "storage_unavailable",
            ReadError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, ReadError::InvalidRequest(_))
    }

    pub fn to_wire(&self) -> WireError {
        WireError {
            kind: self.kind().to_string(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}
