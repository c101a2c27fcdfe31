// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock keys and lock declarations
//!
//! A [`LockKey`] names what a writer holds exclusively in the coordinator while
//! it commits. A [`LockDeclaration`] is the client's claim that it read a
//! target at some position; the writer re-checks it under the lock.

use crate::filter::Filter;
use crate::key::{Collection, FqField, Fqid, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A hierarchical exclusive lock key
///
/// Keys overlap when one contains the other: a collection key covers every
/// model and field in it, a model key covers its fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum LockKey {
    Collection { collection: Collection },
    Model { fqid: Fqid },
    Field { fqfield: FqField },
}

impl LockKey {
    pub fn collection(&self) -> &Collection {
        match self {
            LockKey::Collection { collection } => collection,
            LockKey::Model { fqid } => &fqid.collection,
            LockKey::Field { fqfield } => fqfield.collection(),
        }
    }

    /// True if holding one key must exclude holding the other
    pub fn overlaps(&self, other: &LockKey) -> bool {
        if self.collection() != other.collection() {
            return false;
        }
        match (self, other) {
            (LockKey::Collection { .. }, _) | (_, LockKey::Collection { .. }) => true,
            (LockKey::Model { fqid: a }, LockKey::Model { fqid: b }) => a == b,
            (LockKey::Model { fqid }, LockKey::Field { fqfield })
            | (LockKey::Field { fqfield }, LockKey::Model { fqid }) => &fqfield.fqid == fqid,
            (LockKey::Field { fqfield: a }, LockKey::Field { fqfield: b }) => a == b,
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Collection { collection } => write!(f, "{}", collection),
            LockKey::Model { fqid } => write!(f, "{}", fqid),
            LockKey::Field { fqfield } => write!(f, "{}", fqfield),
        }
    }
}

impl From<FqField> for LockKey {
    fn from(fqfield: FqField) -> Self {
        LockKey::Field { fqfield }
    }
}

impl From<Fqid> for LockKey {
    fn from(fqid: Fqid) -> Self {
        LockKey::Model { fqid }
    }
}

impl From<Collection> for LockKey {
    fn from(collection: Collection) -> Self {
        LockKey::Collection { collection }
    }
}

/// Something a client read before writing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum LockTarget {
    /// One field
    Field { fqfield: FqField },
    /// Every field of one model
    Model { fqid: Fqid },
    /// Models of a collection, optionally narrowed to one field and to models
    /// matching a filter
    Collection {
        collection: Collection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Filter>,
    },
}

impl LockTarget {
    /// Key held in the coordinator while this declaration is re-checked
    pub fn lock_key(&self) -> LockKey {
        match self {
            LockTarget::Field { fqfield } => LockKey::from(fqfield.clone()),
            LockTarget::Model { fqid } => LockKey::from(fqid.clone()),
            LockTarget::Collection { collection, .. } => LockKey::from(collection.clone()),
        }
    }

    /// Whether a write to `fqfield` falls inside the target, ignoring any filter
    pub fn covers(&self, fqfield: &FqField) -> bool {
        match self {
            LockTarget::Field { fqfield: target } => target == fqfield,
            LockTarget::Model { fqid } => &fqfield.fqid == fqid,
            LockTarget::Collection {
                collection, field, ..
            } => {
                fqfield.collection() == collection
                    && field.as_ref().is_none_or(|f| f == &fqfield.field)
            }
        }
    }

    pub fn filter(&self) -> Option<&Filter> {
        match self {
            LockTarget::Collection { filter, .. } => filter.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for LockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockTarget::Field { fqfield } => write!(f, "{}", fqfield),
            LockTarget::Model { fqid } => write!(f, "{}", fqid),
            LockTarget::Collection {
                collection, field, ..
            } => match field {
                Some(field) => write!(f, "{}/{}", collection, field),
                None => write!(f, "{}", collection),
            },
        }
    }
}

/// A read-set entry: `target` was read as of `as_of`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockDeclaration {
    pub target: LockTarget,
    pub as_of: Position,
}

impl LockDeclaration {
    pub fn field(fqfield: FqField, as_of: Position) -> Self {
        Self {
            target: LockTarget::Field { fqfield },
            as_of,
        }
    }

    pub fn model(fqid: Fqid, as_of: Position) -> Self {
        Self {
            target: LockTarget::Model { fqid },
            as_of,
        }
    }

    pub fn collection(
        collection: Collection,
        field: Option<String>,
        filter: Option<Filter>,
        as_of: Position,
    ) -> Self {
        Self {
            target: LockTarget::Collection {
                collection,
                field,
                filter,
            },
            as_of,
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
