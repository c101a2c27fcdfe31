// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volatile log store for tests and single-process embedding

use crate::cursor::{EventSelector, LogCursor};
use crate::index::{allocate_ids, LogIndex};
use crate::record::PositionRecord;
use crate::store::{AppendOutcome, AppendRequest, LogStore, RejectReason, StoreError};
use chrono::Utc;
use ds_core::{Collection, Id, Position};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    records: Vec<PositionRecord>,
    index: LogIndex,
    sequences: BTreeMap<Collection, Id>,
}

/// A [`LogStore`] kept in memory; clones share the same log
#[derive(Clone, Debug, Default)]
pub struct MemoryLogStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogStore for MemoryLogStore {
    fn append(&self, request: AppendRequest) -> Result<AppendOutcome, StoreError> {
        let mut inner = self.lock();
        if request.events.is_empty() {
            return Ok(AppendOutcome::Rejected(RejectReason::Empty));
        }
        if let Some(position) = inner.index.transaction(&request.transaction_id) {
            return Ok(AppendOutcome::Rejected(
                RejectReason::DuplicateTransaction { position },
            ));
        }

        let position = inner.index.head + 1;
        let record = PositionRecord::new(
            position,
            request.transaction_id,
            Utc::now(),
            request.user_id,
            request.information,
            request.events,
        );
        inner.index.observe(&record, 0, 0);
        inner.records.push(record);
        Ok(AppendOutcome::Committed { position })
    }

    fn max_position(&self) -> Result<Position, StoreError> {
        Ok(self.lock().index.head)
    }

    fn records(&self, after: Position, up_to: Position) -> Result<LogCursor, StoreError> {
        let inner = self.lock();
        let selected: Vec<PositionRecord> = inner
            .records
            .iter()
            .filter(|r| r.position > after && r.position <= up_to)
            .cloned()
            .collect();
        Ok(LogCursor::new(selected.into_iter().map(Ok)))
    }

    fn last_change(&self, selector: &EventSelector) -> Result<Option<Position>, StoreError> {
        Ok(self.lock().index.last_change(selector))
    }

    fn migration_index(&self, collection: &Collection) -> Result<Option<u32>, StoreError> {
        Ok(self.lock().index.migration_index(collection))
    }

    fn reserve_ids(&self, collection: &Collection, amount: u32) -> Result<Vec<Id>, StoreError> {
        if amount == 0 {
            return Err(StoreError::InvalidRequest(
                "amount must be at least 1".to_string(),
            ));
        }
        let mut inner = self.lock();
        let Inner {
            index, sequences, ..
        } = &mut *inner;
        allocate_ids(sequences, index, collection, amount)
    }

    fn delete_history_information(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for record in &mut inner.records {
            record.information = None;
        }
        inner.index.generation += 1;
        Ok(())
    }

    fn truncate(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let generation = inner.index.generation + 1;
        *inner = Inner {
            index: LogIndex::at_generation(generation),
            ..Inner::default()
        };
        Ok(())
    }

    fn generation(&self) -> Result<u64, StoreError> {
        Ok(self.lock().index.generation)
    }
}
