// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write transactions as submitted by clients

use crate::error::WriteError;
use ds_core::{CollectionField, FqField, Fqid, LockDeclaration, LockKey, LockTarget, Position};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    /// Write a value; JSON `null` is stored as a value
    Set { fqfield: FqField, value: Value },
    /// Tombstone one field
    Delete { fqfield: FqField },
    /// Tombstone every live field of a model
    DeleteModel { fqid: Fqid },
    /// Edit a list field in place: drop every `remove` item, then append
    /// each `add` item not already present
    ListUpdate {
        fqfield: FqField,
        #[serde(default)]
        add: Vec<Value>,
        #[serde(default)]
        remove: Vec<Value>,
    },
}

impl Mutation {
    pub fn lock_key(&self) -> LockKey {
        match self {
            Mutation::Set { fqfield, .. }
            | Mutation::Delete { fqfield }
            | Mutation::ListUpdate { fqfield, .. } => LockKey::from(fqfield.clone()),
            Mutation::DeleteModel { fqid } => LockKey::from(fqid.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Precondition {
    FieldAbsent { fqfield: FqField },
    FieldPresent { fqfield: FqField },
    ModelAbsent { fqid: Fqid },
    ModelPresent { fqid: Fqid },
}

impl Precondition {
    pub fn lock_key(&self) -> LockKey {
        match self {
            Precondition::FieldAbsent { fqfield } | Precondition::FieldPresent { fqfield } => {
                LockKey::from(fqfield.clone())
            }
            Precondition::ModelAbsent { fqid } | Precondition::ModelPresent { fqid } => {
                LockKey::from(fqid.clone())
            }
        }
    }

    pub fn fqid(&self) -> &Fqid {
        match self {
            Precondition::FieldAbsent { fqfield } | Precondition::FieldPresent { fqfield } => {
                &fqfield.fqid
            }
            Precondition::ModelAbsent { fqid } | Precondition::ModelPresent { fqid } => fqid,
        }
    }
}

/// One atomic transaction
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub mutations: Vec<Mutation>,
    #[serde(default)]
    pub locks: Vec<LockDeclaration>,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information: Option<Value>,
}

impl WriteRequest {
    pub fn new(mutations: Vec<Mutation>) -> Self {
        Self {
            mutations,
            ..Self::default()
        }
    }

    pub fn with_lock(mut self, declaration: LockDeclaration) -> Self {
        self.locks.push(declaration);
        self
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    /// Fold a batch into one transaction committed at a single position
    ///
    /// Mutations apply in batch order. Every precondition and declaration is
    /// checked against the log before the batch.
    pub fn merge(requests: Vec<WriteRequest>) -> Result<Self, WriteError> {
        let mut requests = requests.into_iter();
        let Some(mut merged) = requests.next() else {
            return Err(WriteError::InvalidRequest("empty batch".to_string()));
        };
        let mut information: Vec<Value> = merged.information.take().into_iter().collect();
        for request in requests {
            if request.user_id != merged.user_id {
                return Err(WriteError::InvalidRequest(format!(
                    "batch mixes users {} and {}",
                    merged.user_id, request.user_id
                )));
            }
            merged.mutations.extend(request.mutations);
            merged.locks.extend(request.locks);
            merged.preconditions.extend(request.preconditions);
            information.extend(request.information);
        }
        merged.information = match information.len() {
            0 => None,
            1 => information.pop(),
            _ => Some(Value::Array(information)),
        };
        Ok(merged)
    }

    /// Reject requests that can never commit against a log at `head`
    pub fn validate(&self, head: Position) -> Result<(), WriteError> {
        if self.mutations.is_empty() {
            return Err(WriteError::InvalidRequest("no mutations".to_string()));
        }
        for mutation in &self.mutations {
            if let Mutation::ListUpdate {
                fqfield,
                add,
                remove,
            } = mutation
            {
                if add.is_empty() && remove.is_empty() {
                    return Err(WriteError::InvalidRequest(format!(
                        "list update of {} changes nothing",
                        fqfield
                    )));
                }
            }
        }
        for declaration in &self.locks {
            if declaration.as_of > head {
                return Err(WriteError::InvalidRequest(format!(
                    "lock on {} declared as of {}, beyond head {}",
                    declaration.target, declaration.as_of, head
                )));
            }
            if let LockTarget::Collection {
                collection,
                field: Some(field),
                ..
            } = &declaration.target
            {
                CollectionField::new(collection.clone(), field.as_str())
                    .map_err(|e| WriteError::InvalidRequest(e.to_string()))?;
            }
            if let Some(filter) = declaration.target.filter() {
                filter
                    .validate()
                    .map_err(|e| WriteError::InvalidRequest(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Every key this transaction must hold, deduplicated and ordered
    pub fn lock_keys(&self) -> Vec<LockKey> {
        let keys: BTreeSet<LockKey> = self
            .mutations
            .iter()
            .map(Mutation::lock_key)
            .chain(self.locks.iter().map(|d| d.target.lock_key()))
            .chain(self.preconditions.iter().map(Precondition::lock_key))
            .collect();
        keys.into_iter().collect()
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
