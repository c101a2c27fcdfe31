// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory index over committed records

use crate::cursor::EventSelector;
use crate::record::PositionRecord;
use crate::store::StoreError;
use ds_core::{Collection, CollectionField, FqField, Fqid, Id, Position, TransactionId};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub(crate) struct LogIndex {
    /// Rewrite generation of the log these entries were read from
    pub generation: u64,
    pub head: Position,
    /// Byte offset of each record; `offsets[p - 1]` belongs to position `p`
    pub offsets: Vec<u64>,
    /// Byte offset just past the last indexed record
    pub end_offset: u64,
    transactions: HashMap<TransactionId, Position>,
    fields: HashMap<FqField, Position>,
    models: HashMap<Fqid, Position>,
    collection_fields: HashMap<CollectionField, Position>,
    collections: HashMap<Collection, Position>,
    migration_indexes: HashMap<Collection, u32>,
    max_ids: HashMap<Collection, Id>,
}

impl LogIndex {
    /// An empty index for a log at `generation`
    pub fn at_generation(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn observe(&mut self, record: &PositionRecord, offset: u64, end_offset: u64) {
        let position = record.position;
        self.head = position;
        self.offsets.push(offset);
        self.end_offset = end_offset;
        self.transactions
            .insert(record.transaction_id.clone(), position);

        for event in &record.events {
            let fqfield = &event.fqfield;
            let collection = fqfield.collection();
            self.fields.insert(fqfield.clone(), position);
            self.models.insert(fqfield.fqid.clone(), position);
            self.collection_fields
                .insert(fqfield.collection_field(), position);
            self.collections.insert(collection.clone(), position);

            let index = self
                .migration_indexes
                .entry(collection.clone())
                .or_insert(event.migration_index);
            *index = (*index).max(event.migration_index);

            let max_id = self.max_ids.entry(collection.clone()).or_insert(0);
            *max_id = (*max_id).max(fqfield.fqid.id);
        }
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<Position> {
        self.transactions.get(id).copied()
    }

    pub fn offset_after(&self, position: Position) -> u64 {
        usize::try_from(position)
            .ok()
            .and_then(|p| self.offsets.get(p))
            .copied()
            .unwrap_or(self.end_offset)
    }

    pub fn last_change(&self, selector: &EventSelector) -> Option<Position> {
        match selector {
            EventSelector::All => (self.head > 0).then_some(self.head),
            EventSelector::Collection(collection) => self.collections.get(collection).copied(),
            EventSelector::CollectionField(cf) => self.collection_fields.get(cf).copied(),
            EventSelector::Model(fqid) => self.models.get(fqid).copied(),
            EventSelector::Field(fqfield) => self.fields.get(fqfield).copied(),
        }
    }

    pub fn migration_index(&self, collection: &Collection) -> Option<u32> {
        self.migration_indexes.get(collection).copied()
    }

    pub fn max_id(&self, collection: &Collection) -> Id {
        self.max_ids.get(collection).copied().unwrap_or(0)
    }
}

/// Next free ids for `collection`, given the sequence high-water mark
pub(crate) fn allocate_ids(
    sequences: &mut BTreeMap<Collection, Id>,
    index: &LogIndex,
    collection: &Collection,
    amount: u32,
) -> Result<Vec<Id>, StoreError> {
    let exhausted = || StoreError::InvalidRequest(format!("ids of {} are exhausted", collection));
    let after_used = index.max_id(collection).checked_add(1).ok_or_else(exhausted)?;
    let next = sequences.get(collection).copied().unwrap_or(1).max(after_used);
    let end = next.checked_add(Id::from(amount)).ok_or_else(exhausted)?;
    sequences.insert(collection.clone(), end);
    Ok((next..end).collect())
}
