// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema migrations applied while replaying
//!
//! Every event records the migration index it was written under. Replay
//! runs each event through the migrations above its index, so history on
//! disk is never rewritten.

use ds_core::{Collection, Event};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("migration to index {0} registered twice")]
    Duplicate(u32),
    #[error("migration index must be at least 2, got {0}")]
    InvalidIndex(u32),
}

/// Upgrades events written under `target - 1` to `target`
pub trait Migration: Send + Sync {
    fn target(&self) -> u32;

    /// Whether events of this collection are touched at all
    fn applies_to(&self, _collection: &Collection) -> bool {
        true
    }

    /// Rewrite one event; it may split into several or vanish
    fn migrate(&self, event: Event) -> Vec<Event>;
}

/// Registered migrations ordered by target index
#[derive(Clone, Default)]
pub struct Migrations {
    by_target: BTreeMap<u32, Arc<dyn Migration>>,
}

impl std::fmt::Debug for Migrations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrations")
            .field("targets", &self.by_target.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Migrations {
    /// No migrations: every event replays as recorded
    pub fn none() -> Self {
        Self::default()
    }

    pub fn register(&mut self, migration: Arc<dyn Migration>) -> Result<(), MigrationError> {
        let target = migration.target();
        if target < 2 {
            return Err(MigrationError::InvalidIndex(target));
        }
        if self.by_target.contains_key(&target) {
            return Err(MigrationError::Duplicate(target));
        }
        self.by_target.insert(target, migration);
        Ok(())
    }

    /// Index new events should be written under
    pub fn current_index(&self) -> Option<u32> {
        self.by_target.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }

    /// Bring an event up to the current index
    pub fn apply(&self, event: Event) -> Vec<Event> {
        let mut events = vec![event];
        let pending = self
            .by_target
            .range(events[0].migration_index.saturating_add(1)..);
        for (&target, migration) in pending {
            events = events
                .into_iter()
                .flat_map(|event| {
                    if migration.applies_to(event.collection()) {
                        migration.migrate(event)
                    } else {
                        vec![event]
                    }
                })
                .map(|mut event| {
                    event.migration_index = target;
                    event
                })
                .collect();
        }
        events
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
