// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checks and event construction performed under a transaction's locks
//!
//! Everything here reads the log synchronously and runs on a blocking
//! thread.

use crate::error::WriteError;
use crate::request::{Mutation, Precondition, WriteRequest};
use ds_core::{
    Change, Collection, CollectionField, Filter, Fqid, LockDeclaration, LockTarget, Model,
    Position,
};
use ds_storage::{replay, EventSelector, LogStore, MaterializedState, Migrations, RecordedEvent};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Events matching a declaration's target, ignoring its filter
fn target_selector(target: &LockTarget) -> Result<EventSelector, WriteError> {
    Ok(match target {
        LockTarget::Field { fqfield } => EventSelector::Field(fqfield.clone()),
        LockTarget::Model { fqid } => EventSelector::Model(fqid.clone()),
        LockTarget::Collection {
            collection,
            field: Some(field),
            ..
        } => EventSelector::CollectionField(
            CollectionField::new(collection.clone(), field.as_str())
                .map_err(|e| WriteError::InvalidRequest(e.to_string()))?,
        ),
        LockTarget::Collection { collection, .. } => EventSelector::Collection(collection.clone()),
    })
}

/// Fail if any declared target changed after its as-of position
pub fn check_declarations<S: LogStore + ?Sized>(
    store: &S,
    declarations: &[LockDeclaration],
    head: Position,
    migrations: &Migrations,
) -> Result<(), WriteError> {
    for declaration in declarations {
        if declaration.as_of >= head {
            continue;
        }
        let selector = target_selector(&declaration.target)?;
        let Some(last) = store.last_change(&selector)? else {
            continue;
        };
        if last <= declaration.as_of {
            continue;
        }

        let changed_at = match declaration.target.filter() {
            None => Some(last),
            Some(filter) => first_matching_change(
                store,
                selector,
                declaration.target.lock_key().collection(),
                filter,
                declaration.as_of,
                head,
                migrations,
            )?,
        };
        if let Some(position) = changed_at {
            debug!(
                target = %declaration.target,
                as_of = declaration.as_of,
                position,
                "stale declaration"
            );
            return Err(WriteError::ConcurrencyConflict {
                target: declaration.target.to_string(),
                as_of: declaration.as_of,
                position,
            });
        }
    }
    Ok(())
}

/// Earliest change after `as_of` to a model matching `filter` before or
/// after the change
fn first_matching_change<S: LogStore + ?Sized>(
    store: &S,
    selector: EventSelector,
    collection: &Collection,
    filter: &Filter,
    as_of: Position,
    head: Position,
    migrations: &Migrations,
) -> Result<Option<Position>, WriteError> {
    let mut touched: BTreeMap<Fqid, Position> = BTreeMap::new();
    for event in store.events(selector, as_of, head)? {
        let event = event?;
        touched.entry(event.fqid().clone()).or_insert(event.position);
    }
    if touched.is_empty() {
        return Ok(None);
    }

    let whole = EventSelector::Collection(collection.clone());
    let before = replay(store, whole.clone(), as_of, migrations)?;
    let after = replay(store, whole, head, migrations)?;
    let matches = |model: Option<&Model>| model.is_some_and(|m| filter.matches(m));

    Ok(touched
        .into_iter()
        .filter(|(fqid, _)| matches(before.get(fqid)) || matches(after.get(fqid)))
        .map(|(_, position)| position)
        .min())
}

/// Current state of the models a request's preconditions, model deletions
/// and list updates refer to
pub fn load_models<S: LogStore + ?Sized>(
    store: &S,
    request: &WriteRequest,
    head: Position,
    migrations: &Migrations,
) -> Result<MaterializedState, WriteError> {
    let mut wanted: BTreeSet<Fqid> = request
        .preconditions
        .iter()
        .map(|p| p.fqid().clone())
        .collect();
    wanted.extend(request.mutations.iter().filter_map(|m| match m {
        Mutation::DeleteModel { fqid } => Some(fqid.clone()),
        Mutation::ListUpdate { fqfield, .. } => Some(fqfield.fqid.clone()),
        _ => None,
    }));

    // Models the log never mentioned need no scan
    let mut existing = BTreeSet::new();
    for fqid in wanted {
        if store.last_change(&EventSelector::Model(fqid.clone()))?.is_some() {
            existing.insert(fqid);
        }
    }

    let mut state = MaterializedState::new();
    if existing.is_empty() {
        state.advance_to(head);
        return Ok(state);
    }
    if let (1, Some(fqid)) = (existing.len(), existing.first()) {
        let selector = EventSelector::Model(fqid.clone());
        return Ok(replay(store, selector, head, migrations)?);
    }
    for event in store.events(EventSelector::All, 0, head)? {
        let event = event?;
        if existing.contains(event.fqid()) {
            state
                .apply_migrated(event, migrations)
                .map_err(|e| WriteError::StorageUnavailable(e.to_string()))?;
        }
    }
    state.advance_to(head);
    Ok(state)
}

pub fn check_preconditions(
    state: &MaterializedState,
    preconditions: &[Precondition],
) -> Result<(), WriteError> {
    for precondition in preconditions {
        let failure = match precondition {
            Precondition::FieldAbsent { fqfield } => state
                .field(fqfield)
                .map(|_| format!("{} exists", fqfield)),
            Precondition::FieldPresent { fqfield } => state
                .field(fqfield)
                .is_none()
                .then(|| format!("{} does not exist", fqfield)),
            Precondition::ModelAbsent { fqid } => {
                state.exists(fqid).then(|| format!("{} exists", fqid))
            }
            Precondition::ModelPresent { fqid } => (!state.exists(fqid))
                .then(|| format!("{} does not exist", fqid)),
        };
        if let Some(reason) = failure {
            return Err(WriteError::PreconditionFailed(reason));
        }
    }
    Ok(())
}

/// Expand mutations into field-level events in request order
///
/// Each mutation sees the models as left by the ones before it, so a model
/// deletion also removes fields set earlier in the same request.
pub fn build_events<S: LogStore + ?Sized>(
    store: &S,
    mutations: &[Mutation],
    state: &MaterializedState,
    default_migration_index: u32,
) -> Result<Vec<RecordedEvent>, WriteError> {
    let mut indexes: HashMap<Collection, u32> = HashMap::new();
    let mut migration_index = |collection: &Collection| -> Result<u32, WriteError> {
        if let Some(index) = indexes.get(collection) {
            return Ok(*index);
        }
        let index = store
            .migration_index(collection)?
            .unwrap_or(default_migration_index)
            .max(default_migration_index);
        indexes.insert(collection.clone(), index);
        Ok(index)
    };

    let mut working: HashMap<Fqid, Model> = HashMap::new();
    let mut events = Vec::new();
    for mutation in mutations {
        match mutation {
            Mutation::Set { fqfield, value } => {
                let index = migration_index(fqfield.collection())?;
                working_model(&mut working, state, &fqfield.fqid)
                    .insert(fqfield.field.clone(), value.clone());
                events.push(RecordedEvent::new(
                    fqfield.clone(),
                    Change::Set(value.clone()),
                    index,
                ));
            }
            Mutation::Delete { fqfield } => {
                let index = migration_index(fqfield.collection())?;
                working_model(&mut working, state, &fqfield.fqid).remove(&fqfield.field);
                events.push(RecordedEvent::new(fqfield.clone(), Change::Tombstone, index));
            }
            Mutation::DeleteModel { fqid } => {
                let index = migration_index(&fqid.collection)?;
                let model = working_model(&mut working, state, fqid);
                if model.is_empty() {
                    return Err(WriteError::PreconditionFailed(format!(
                        "{} does not exist",
                        fqid
                    )));
                }
                for field in std::mem::take(model).into_keys() {
                    let fqfield = fqid
                        .field(field.as_str())
                        .map_err(|e| WriteError::InvalidRequest(e.to_string()))?;
                    events.push(RecordedEvent::new(fqfield, Change::Tombstone, index));
                }
            }
            Mutation::ListUpdate {
                fqfield,
                add,
                remove,
            } => {
                let index = migration_index(fqfield.collection())?;
                let model = working_model(&mut working, state, &fqfield.fqid);
                let list = updated_list(model.get(&fqfield.field), add, remove)
                    .ok_or_else(|| {
                        WriteError::PreconditionFailed(format!("{} is not a list", fqfield))
                    })?;
                model.insert(fqfield.field.clone(), list.clone());
                events.push(RecordedEvent::new(fqfield.clone(), Change::Set(list), index));
            }
        }
    }
    Ok(events)
}

fn working_model<'a>(
    working: &'a mut HashMap<Fqid, Model>,
    state: &MaterializedState,
    fqid: &Fqid,
) -> &'a mut Model {
    working
        .entry(fqid.clone())
        .or_insert_with(|| state.get(fqid).cloned().unwrap_or_default())
}

/// `current` with `remove` items dropped and new `add` items appended;
/// `None` when `current` holds something other than a list
fn updated_list(current: Option<&Value>, add: &[Value], remove: &[Value]) -> Option<Value> {
    let mut items = match current {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => return None,
    };
    items.retain(|item| !remove.contains(item));
    for item in add {
        if !items.contains(item) {
            items.push(item.clone());
        }
    }
    Some(Value::Array(items))
}

#[cfg(test)]
#[path = "transaction_tests.rs"]
mod tests;
