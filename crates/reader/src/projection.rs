// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incrementally maintained state at the reader's known position
//!
//! The projection always equals a full replay of the log at its position.
//! It remembers the log generation it was built from and rebuilds when the
//! log has been rewritten since. Filter results are memoized per `(collection, filter signature)` and
//! dropped exactly when an applied event touches that collection.

use crate::query::{matching_models, Matches};
use ds_core::{Collection, Filter, Position};
use ds_storage::{replay, EventSelector, LogStore, MaterializedState, Migrations, StoreError};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use tracing::{debug, warn};

type FilterKey = (Collection, String);

#[derive(Debug, Default)]
pub struct Projection {
    state: MaterializedState,
    generation: u64,
    filters: Mutex<HashMap<FilterKey, Matches>>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Position {
        self.state.position()
    }

    pub fn state(&self) -> &MaterializedState {
        &self.state
    }

    /// Apply every record in `(position, head]`
    ///
    /// A new log generation, or a head below the current position, means
    /// the log was rewritten; the projection is then rebuilt from scratch.
    pub fn catch_up<S: LogStore + ?Sized>(
        &mut self,
        store: &S,
        head: Position,
        migrations: &Migrations,
    ) -> Result<Position, StoreError> {
        let from = self.position();
        let generation = store.generation()?;
        if from == 0 {
            self.generation = generation;
        }
        if generation != self.generation || head < from {
            warn!(
                from,
                head,
                generation,
                "log rewritten, rebuilding projection"
            );
            self.state = replay(store, EventSelector::All, head, migrations)?;
            self.generation = generation;
            self.filters_mut().clear();
            return Ok(self.position());
        }
        if head == from {
            return Ok(from);
        }

        let mut touched = BTreeSet::new();
        let applied = self.apply_range(store, from, head, migrations, &mut touched);
        self.invalidate(&touched);
        applied?;

        self.state.advance_to(head);
        debug!(from, to = head, collections = touched.len(), "projection advanced");
        Ok(head)
    }

    fn apply_range<S: LogStore + ?Sized>(
        &mut self,
        store: &S,
        after: Position,
        head: Position,
        migrations: &Migrations,
        touched: &mut BTreeSet<Collection>,
    ) -> Result<(), StoreError> {
        for event in store.events(EventSelector::All, after, head)? {
            let event = event?;
            touched.insert(event.collection().clone());
            self.state
                .apply_migrated(event, migrations)
                .map_err(|e| StoreError::Corrupted {
                    line: 0,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    fn invalidate(&mut self, collections: &BTreeSet<Collection>) {
        if collections.is_empty() {
            return;
        }
        self.filters_mut()
            .retain(|(collection, _), _| !collections.contains(collection));
    }

    /// Models of `collection` matching `filter`, memoized
    pub fn matching(&self, collection: &Collection, filter: &Filter) -> Matches {
        let key = (collection.clone(), filter.signature());
        let mut filters = self.filters.lock().unwrap_or_else(|e| e.into_inner());
        filters
            .entry(key)
            .or_insert_with(|| matching_models(&self.state, collection, filter))
            .clone()
    }

    /// Number of memoized filter results
    pub fn cached_filters(&self) -> usize {
        self.filters.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn filters_mut(&mut self) -> &mut HashMap<FilterKey, Matches> {
        self.filters.get_mut().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod tests;
