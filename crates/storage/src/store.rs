// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The log store interface shared by writers and readers

use crate::cursor::{EventCursor, EventSelector, LogCursor};
use crate::record::RecordedEvent;
use ds_core::{Collection, Id, Position, TransactionId};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checksum mismatch at position {position}")]
    ChecksumMismatch { position: Position },
    #[error("corrupted log at line {line}: {reason}")]
    Corrupted { line: u64, reason: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    /// Whether the store itself could not be reached or read
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, StoreError::InvalidRequest(_))
    }
}

/// A transaction ready to be made durable
#[derive(Clone, Debug, PartialEq)]
pub struct AppendRequest {
    pub transaction_id: TransactionId,
    pub user_id: u64,
    pub information: Option<Value>,
    pub events: Vec<RecordedEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Nothing to append
    Empty,
    /// This transaction id already committed at `position`
    DuplicateTransaction { position: Position },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Committed { position: Position },
    Rejected(RejectReason),
}

/// Durable, totally ordered event log
///
/// Positions start at 1 and grow by one per committed transaction. A record
/// becomes visible to every reader at once, after it is durable.
pub trait LogStore: Send + Sync + 'static {
    /// Atomically append one transaction
    fn append(&self, request: AppendRequest) -> Result<AppendOutcome, StoreError>;

    /// Highest committed position, 0 for an empty log
    fn max_position(&self) -> Result<Position, StoreError>;

    /// Records with `after < position <= up_to`, ascending
    fn records(&self, after: Position, up_to: Position) -> Result<LogCursor, StoreError>;

    /// Latest position holding an event the selector matches
    fn last_change(&self, selector: &EventSelector) -> Result<Option<Position>, StoreError>;

    /// Highest migration index recorded for a collection
    fn migration_index(&self, collection: &Collection) -> Result<Option<u32>, StoreError>;

    /// Hand out `amount` unused ids, never reused
    fn reserve_ids(&self, collection: &Collection, amount: u32) -> Result<Vec<Id>, StoreError>;

    /// Erase the free-form information of every record
    fn delete_history_information(&self) -> Result<(), StoreError>;

    /// Drop every record and id reservation
    fn truncate(&self) -> Result<(), StoreError>;

    /// Counter bumped whenever the log is rewritten in place (history
    /// erased or truncated)
    ///
    /// Anything derived from the log at one generation must be rebuilt
    /// once the generation changes.
    fn generation(&self) -> Result<u64, StoreError>;

    /// Events matching `selector` with `after < position <= up_to`, ascending
    fn events(
        &self,
        selector: EventSelector,
        after: Position,
        up_to: Position,
    ) -> Result<EventCursor, StoreError> {
        Ok(EventCursor::new(self.records(after, up_to)?, selector))
    }
}
