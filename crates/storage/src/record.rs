// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One committed position with checksum verification
//!
//! A record holds every event of one transaction. The checksum covers the
//! position, transaction id, author and events; the free-form `information`
//! is left out so it can be erased without touching history.

use crate::store::StoreError;
use chrono::{DateTime, Utc};
use ds_core::{Change, Event, FqField, Position, TransactionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event as stored, before its record's position is attached
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub fqfield: FqField,
    pub change: Change,
    pub migration_index: u32,
}

impl RecordedEvent {
    pub fn new(fqfield: FqField, change: Change, migration_index: u32) -> Self {
        Self {
            fqfield,
            change,
            migration_index,
        }
    }
}

/// A single line of the log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub position: Position,
    pub transaction_id: TransactionId,
    pub timestamp: DateTime<Utc>,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information: Option<Value>,
    pub events: Vec<RecordedEvent>,
    pub checksum: u32,
}

#[derive(Serialize)]
struct Checksummed<'a> {
    position: Position,
    transaction_id: &'a TransactionId,
    user_id: u64,
    events: &'a [RecordedEvent],
}

impl PositionRecord {
    pub fn new(
        position: Position,
        transaction_id: TransactionId,
        timestamp: DateTime<Utc>,
        user_id: u64,
        information: Option<Value>,
        events: Vec<RecordedEvent>,
    ) -> Self {
        let mut record = Self {
            position,
            transaction_id,
            timestamp,
            user_id,
            information,
            events,
            checksum: 0,
        };
        record.checksum = record.calculate_checksum();
        record
    }

    fn calculate_checksum(&self) -> u32 {
        let covered = Checksummed {
            position: self.position,
            transaction_id: &self.transaction_id,
            user_id: self.user_id,
            events: &self.events,
        };
        // Keys and JSON values always serialize.
        let json = serde_json::to_string(&covered).unwrap_or_default();
        crc32fast::hash(json.as_bytes())
    }

    pub fn verify(&self) -> bool {
        self.checksum == self.calculate_checksum()
    }

    /// Events stamped with this record's position, in recorded order
    pub fn events(&self) -> impl Iterator<Item = Event> + '_ {
        self.events.iter().map(|recorded| Event {
            position: self.position,
            fqfield: recorded.fqfield.clone(),
            change: recorded.change.clone(),
            migration_index: recorded.migration_index,
        })
    }

    pub fn into_events(self) -> impl Iterator<Item = Event> {
        let position = self.position;
        self.events.into_iter().map(move |recorded| Event {
            position,
            fqfield: recorded.fqfield,
            change: recorded.change,
            migration_index: recorded.migration_index,
        })
    }

    /// Serialize to one line of JSON, without the newline
    pub fn to_line(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and verify one line
    pub fn from_line(line: &str) -> Result<Self, StoreError> {
        let record: Self = serde_json::from_str(line)?;
        if !record.verify() {
            return Err(StoreError::ChecksumMismatch {
                position: record.position,
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
