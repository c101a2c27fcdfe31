// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from log replay

use crate::cursor::EventSelector;
use crate::migration::Migrations;
use crate::store::{LogStore, StoreError};
use ds_core::{Change, Collection, Event, FqField, Fqid, Model, Position};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("event at position {event} is older than state at {state}")]
    OutOfOrder { event: Position, state: Position },
}

/// Whether a model is live, was deleted, or never had a field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Alive,
    Deleted,
    Absent,
}

/// Models as of one position, built by folding events in order
///
/// A model exists while it has at least one live field; tombstoning its
/// last field removes it and marks it deleted until a field is set again.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterializedState {
    position: Position,
    models: BTreeMap<Fqid, Model>,
    deleted: BTreeSet<Fqid>,
}

impl MaterializedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position this state reflects
    pub fn position(&self) -> Position {
        self.position
    }

    /// Apply one event
    pub fn apply(&mut self, event: &Event) -> Result<(), ApplyError> {
        if event.position < self.position {
            return Err(ApplyError::OutOfOrder {
                event: event.position,
                state: self.position,
            });
        }
        self.position = event.position;

        let FqField { fqid, field } = &event.fqfield;
        match &event.change {
            Change::Set(value) => {
                self.deleted.remove(fqid);
                self.models
                    .entry(fqid.clone())
                    .or_default()
                    .insert(field.clone(), value.clone());
            }
            Change::Tombstone => {
                if let Some(model) = self.models.get_mut(fqid) {
                    model.remove(field);
                    if model.is_empty() {
                        self.models.remove(fqid);
                        self.deleted.insert(fqid.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply one event after bringing it up to the current migration index
    pub fn apply_migrated(
        &mut self,
        event: Event,
        migrations: &Migrations,
    ) -> Result<(), ApplyError> {
        if migrations.is_empty() {
            return self.apply(&event);
        }
        migrations
            .apply(event)
            .iter()
            .try_for_each(|event| self.apply(event))
    }

    /// Mark the state current at `position` when no selected event landed
    /// there
    pub fn advance_to(&mut self, position: Position) {
        self.position = self.position.max(position);
    }

    pub fn get(&self, fqid: &Fqid) -> Option<&Model> {
        self.models.get(fqid)
    }

    pub fn field(&self, fqfield: &FqField) -> Option<&Value> {
        self.models
            .get(&fqfield.fqid)
            .and_then(|model| model.get(&fqfield.field))
    }

    pub fn exists(&self, fqid: &Fqid) -> bool {
        self.models.contains_key(fqid)
    }

    pub fn status(&self, fqid: &Fqid) -> ModelStatus {
        if self.exists(fqid) {
            ModelStatus::Alive
        } else if self.deleted.contains(fqid) {
            ModelStatus::Deleted
        } else {
            ModelStatus::Absent
        }
    }

    /// Models of one collection in id order
    pub fn collection<'a>(
        &'a self,
        collection: &'a Collection,
    ) -> impl Iterator<Item = (&'a Fqid, &'a Model)> + 'a {
        self.models
            .iter()
            .filter(move |(fqid, _)| &fqid.collection == collection)
    }

    pub fn models(&self) -> impl Iterator<Item = (&Fqid, &Model)> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Fold the selected events with `position <= up_to` into fresh state
///
/// The result reports `up_to` (clamped to the head) as its position even if
/// the last selected event is older.
pub fn replay<S: LogStore + ?Sized>(
    store: &S,
    selector: EventSelector,
    up_to: Position,
    migrations: &Migrations,
) -> Result<MaterializedState, StoreError> {
    let up_to = up_to.min(store.max_position()?);
    let mut state = MaterializedState::new();
    for event in store.events(selector, 0, up_to)? {
        state
            .apply_migrated(event?, migrations)
            .map_err(|e| StoreError::Corrupted {
                line: 0,
                reason: e.to_string(),
            })?;
    }
    state.advance_to(up_to);
    Ok(state)
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
