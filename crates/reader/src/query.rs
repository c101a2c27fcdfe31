// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read queries and their evaluation against materialized state

use crate::error::ReadError;
use ds_core::key::validate_field;
use ds_core::{Collection, Filter, FqField, Fqid, Model, Position};
use ds_storage::{EventSelector, MaterializedState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Matching models of one collection, in id order
pub type Matches = Arc<BTreeSet<Fqid>>;

/// A read request; `fields` restricts returned models to those fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    Get {
        fqid: Fqid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<String>>,
    },
    GetField {
        fqfield: FqField,
    },
    GetMany {
        fqids: Vec<Fqid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<String>>,
    },
    GetAll {
        collection: Collection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<String>>,
    },
    Filter {
        collection: Collection,
        filter: Filter,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<String>>,
    },
    Exists {
        collection: Collection,
        filter: Filter,
    },
    Count {
        collection: Collection,
        filter: Filter,
    },
    Min {
        collection: Collection,
        filter: Filter,
        field: String,
    },
    Max {
        collection: Collection,
        filter: Filter,
        field: String,
    },
    /// `"alive"`, `"deleted"` or `"absent"`
    Status {
        fqid: Fqid,
    },
}

/// Which position a query must be answered at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Consistency {
    /// The newest position the reader knows, but no older than `min_position`
    Latest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_position: Option<Position>,
    },
    /// Exactly this position
    Pinned { position: Position },
}

impl Default for Consistency {
    fn default() -> Self {
        Consistency::Latest { min_position: None }
    }
}

impl Consistency {
    pub fn latest() -> Self {
        Self::default()
    }

    pub fn at_least(position: Position) -> Self {
        Consistency::Latest {
            min_position: Some(position),
        }
    }

    pub fn pinned(position: Position) -> Self {
        Consistency::Pinned { position }
    }
}

/// A query's answer and the position it reflects
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub position: Position,
    pub data: Value,
}

impl Query {
    pub fn validate(&self) -> Result<(), ReadError> {
        let invalid = |e: &dyn std::fmt::Display| ReadError::InvalidRequest(e.to_string());
        if let Some(fields) = self.fields() {
            for field in fields {
                validate_field(field).map_err(|e| invalid(&e))?;
            }
        }
        if let Some((_, filter)) = self.filter() {
            filter.validate().map_err(|e| invalid(&e))?;
        }
        if let Query::Min { field, .. } | Query::Max { field, .. } = self {
            validate_field(field).map_err(|e| invalid(&e))?;
        }
        Ok(())
    }

    fn fields(&self) -> Option<&[String]> {
        match self {
            Query::Get { fields, .. }
            | Query::GetMany { fields, .. }
            | Query::GetAll { fields, .. }
            | Query::Filter { fields, .. } => fields.as_deref(),
            _ => None,
        }
    }

    /// Collection and filter of filter-based queries
    pub fn filter(&self) -> Option<(&Collection, &Filter)> {
        match self {
            Query::Filter {
                collection, filter, ..
            }
            | Query::Exists { collection, filter }
            | Query::Count { collection, filter }
            | Query::Min {
                collection, filter, ..
            }
            | Query::Max {
                collection, filter, ..
            } => Some((collection, filter)),
            _ => None,
        }
    }

    /// Smallest event selection a replay needs to answer this query
    pub fn selector(&self) -> EventSelector {
        match self {
            Query::Get { fqid, .. } | Query::Status { fqid } => EventSelector::Model(fqid.clone()),
            Query::GetField { fqfield } => EventSelector::Field(fqfield.clone()),
            Query::GetMany { fqids, .. } => match fqids.as_slice() {
                [fqid] => EventSelector::Model(fqid.clone()),
                _ => EventSelector::All,
            },
            Query::GetAll { collection, .. } => EventSelector::Collection(collection.clone()),
            Query::Filter { collection, .. }
            | Query::Exists { collection, .. }
            | Query::Count { collection, .. }
            | Query::Min { collection, .. }
            | Query::Max { collection, .. } => EventSelector::Collection(collection.clone()),
        }
    }

    /// Evaluate against `state`; `matching` resolves filters, possibly from
    /// a cache
    ///
    /// Missing models and fields answer `null`, or are left out of maps.
    pub fn answer<M>(&self, state: &MaterializedState, matching: M) -> Value
    where
        M: FnOnce(&Collection, &Filter) -> Matches,
    {
        match self {
            Query::Get { fqid, fields } => state
                .get(fqid)
                .map_or(Value::Null, |model| project(model, fields.as_deref())),
            Query::GetField { fqfield } => state.field(fqfield).cloned().unwrap_or(Value::Null),
            Query::GetMany { fqids, fields } => {
                let mut by_collection: Map<String, Value> = Map::new();
                for fqid in fqids {
                    let Some(model) = state.get(fqid) else {
                        continue;
                    };
                    let entry = by_collection
                        .entry(fqid.collection.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(models) = entry {
                        models.insert(fqid.id.to_string(), project(model, fields.as_deref()));
                    }
                }
                Value::Object(by_collection)
            }
            Query::GetAll { collection, fields } => Value::Object(
                state
                    .collection(collection)
                    .map(|(fqid, model)| (fqid.id.to_string(), project(model, fields.as_deref())))
                    .collect(),
            ),
            Query::Filter {
                collection,
                filter,
                fields,
            } => {
                let matches = matching(collection, filter);
                Value::Object(
                    models_of(state, &matches)
                        .map(|(fqid, model)| {
                            (fqid.id.to_string(), project(model, fields.as_deref()))
                        })
                        .collect(),
                )
            }
            Query::Exists { collection, filter } => {
                Value::Bool(!matching(collection, filter).is_empty())
            }
            Query::Count { collection, filter } => {
                Value::from(matching(collection, filter).len() as u64)
            }
            Query::Min {
                collection,
                filter,
                field,
            } => {
                let matches = matching(collection, filter);
                extreme(models_of(state, &matches), field, std::cmp::Ordering::Less)
            }
            Query::Max {
                collection,
                filter,
                field,
            } => {
                let matches = matching(collection, filter);
                extreme(models_of(state, &matches), field, std::cmp::Ordering::Greater)
            }
            Query::Status { fqid } => {
                serde_json::to_value(state.status(fqid)).unwrap_or(Value::Null)
            }
        }
    }
}

/// Models of `collection` in `state` matching `filter`
pub fn matching_models(state: &MaterializedState, collection: &Collection, filter: &Filter) -> Matches {
    Arc::new(
        state
            .collection(collection)
            .filter(|(_, model)| filter.matches(model))
            .map(|(fqid, _)| fqid.clone())
            .collect(),
    )
}

fn models_of<'a>(
    state: &'a MaterializedState,
    matches: &'a BTreeSet<Fqid>,
) -> impl Iterator<Item = (&'a Fqid, &'a Model)> + 'a {
    matches
        .iter()
        .filter_map(move |fqid| state.get(fqid).map(|model| (fqid, model)))
}

fn project(model: &Model, fields: Option<&[String]>) -> Value {
    let selected: Map<String, Value> = match fields {
        None => model.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(fields) => fields
            .iter()
            .filter_map(|field| model.get(field).map(|v| (field.clone(), v.clone())))
            .collect(),
    };
    Value::Object(selected)
}

/// Smallest or largest value of `field`
///
/// Numbers are compared when any model holds one, otherwise strings; other
/// values are ignored. `null` when nothing qualifies.
fn extreme<'a>(
    models: impl Iterator<Item = (&'a Fqid, &'a Model)>,
    field: &str,
    wanted: std::cmp::Ordering,
) -> Value {
    let values: Vec<&Value> = models.filter_map(|(_, model)| model.get(field)).collect();
    let best_number = values
        .iter()
        .filter_map(|v| v.as_f64().map(|n| (n, *v)))
        .reduce(|best, next| {
            if next.0.partial_cmp(&best.0) == Some(wanted) {
                next
            } else {
                best
            }
        });
    if let Some((_, value)) = best_number {
        return value.clone();
    }
    values
        .iter()
        .filter_map(|v| v.as_str())
        .reduce(|best, next| if next.cmp(best) == wanted { next } else { best })
        .map_or(Value::Null, |s| Value::String(s.to_string()))
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
