// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Field-level events and change notifications

use crate::key::{Collection, FqField, Fqid, Position};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A materialized model: field name → current value
pub type Model = BTreeMap<String, Value>;

/// What an event does to its field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Change {
    /// Field takes this value (JSON `null` included)
    Set(Value),
    /// Field is deleted
    Tombstone,
}

impl Change {
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Change::Tombstone)
    }
}

/// An immutable field-level event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub position: Position,
    pub fqfield: FqField,
    pub change: Change,
    pub migration_index: u32,
}

impl Event {
    pub fn fqid(&self) -> &Fqid {
        &self.fqfield.fqid
    }

    pub fn collection(&self) -> &Collection {
        self.fqfield.collection()
    }
}

/// Published once per committed transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub position: Position,
    pub fields: Vec<FqField>,
}

impl Notification {
    pub fn new(position: Position, fields: impl IntoIterator<Item = FqField>) -> Self {
        let fields: BTreeSet<FqField> = fields.into_iter().collect();
        Self {
            position,
            fields: fields.into_iter().collect(),
        }
    }

    /// Distinct models touched by the transaction
    pub fn fqids(&self) -> BTreeSet<&Fqid> {
        self.fields.iter().map(|f| &f.fqid).collect()
    }

    /// Distinct collections touched by the transaction
    pub fn collections(&self) -> BTreeSet<&Collection> {
        self.fields.iter().map(|f| f.collection()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fqfield(raw: &str) -> FqField {
        raw.parse().unwrap()
    }

    #[test]
    fn change_serializes_with_type_tag() {
        let set = serde_json::to_value(Change::Set(json!("Alice"))).unwrap();
        assert_eq!(set, json!({"type": "set", "value": "Alice"}));

        let tombstone = serde_json::to_value(Change::Tombstone).unwrap();
        assert_eq!(tombstone, json!({"type": "tombstone"}));
    }

    #[test]
    fn set_null_is_not_a_tombstone() {
        let back: Change = serde_json::from_value(json!({"type": "set", "value": null})).unwrap();
        assert_eq!(back, Change::Set(Value::Null));
        assert!(!back.is_tombstone());
    }

    #[test]
    fn notification_dedupes_and_sorts_fields() {
        let notification = Notification::new(
            3,
            vec![
                fqfield("users/2/name"),
                fqfield("groups/1/title"),
                fqfield("users/2/name"),
                fqfield("users/1/name"),
            ],
        );

        assert_eq!(notification.fields.len(), 3);
        assert_eq!(notification.fields[0], fqfield("groups/1/title"));
        assert_eq!(notification.fqids().len(), 3);
        assert_eq!(notification.collections().len(), 2);
    }
}
