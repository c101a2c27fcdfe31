// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filter expressions over materialized models
//!
//! Filters are pure: [`Filter::matches`] only looks at the model passed in.
//! Their canonical JSON rendering ([`Filter::signature`]) keys reader caches.

use crate::event::Model;
use crate::key::validate_field;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid field in filter: {0:?}")]
    InvalidField(String),
    #[error("empty {0} filter")]
    EmptyGroup(&'static str),
    #[error("operator {operator} needs a string value")]
    NotAString { operator: &'static str },
}

/// Comparison operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    /// Case-insensitive string equality
    #[serde(rename = "~=")]
    IEq,
    /// Case-insensitive pattern match, `%` any run, `_` one character
    #[serde(rename = "%=")]
    ILike,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::IEq => "~=",
            Operator::ILike => "%=",
        }
    }
}

/// A filter expression
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Field {
        field: String,
        operator: Operator,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn field(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Filter::Field {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Operator::Eq, value)
    }

    /// Check field names and operator/value pairs
    pub fn validate(&self) -> Result<(), FilterError> {
        match self {
            Filter::Field {
                field,
                operator,
                value,
            } => {
                validate_field(field).map_err(|_| FilterError::InvalidField(field.clone()))?;
                if matches!(operator, Operator::IEq | Operator::ILike) && !value.is_string() {
                    return Err(FilterError::NotAString {
                        operator: operator.symbol(),
                    });
                }
                Ok(())
            }
            Filter::And(filters) if filters.is_empty() => Err(FilterError::EmptyGroup("and")),
            Filter::Or(filters) if filters.is_empty() => Err(FilterError::EmptyGroup("or")),
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().try_for_each(Filter::validate)
            }
            Filter::Not(inner) => inner.validate(),
        }
    }

    /// Evaluate against a model
    pub fn matches(&self, model: &Model) -> bool {
        match self {
            Filter::Field {
                field,
                operator,
                value,
            } => compare(model.get(field), *operator, value),
            Filter::And(filters) => filters.iter().all(|f| f.matches(model)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(model)),
            Filter::Not(inner) => !inner.matches(model),
        }
    }

    /// Canonical rendering used as a cache key
    pub fn signature(&self) -> String {
        // Filters hold only strings, enums and JSON values, which always serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn compare(actual: Option<&Value>, operator: Operator, expected: &Value) -> bool {
    match operator {
        Operator::Eq => equals(actual, expected),
        Operator::Ne => !equals(actual, expected),
        Operator::Lt => ordering(actual, expected) == Some(Ordering::Less),
        Operator::Le => matches!(
            ordering(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Gt => ordering(actual, expected) == Some(Ordering::Greater),
        Operator::Ge => matches!(
            ordering(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::IEq => match (actual.and_then(Value::as_str), expected.as_str()) {
            (Some(a), Some(e)) => a.to_lowercase() == e.to_lowercase(),
            _ => false,
        },
        Operator::ILike => match (actual.and_then(Value::as_str), expected.as_str()) {
            (Some(a), Some(pattern)) => ilike(a, pattern),
            _ => false,
        },
    }
}

/// `= null` matches a missing field as well as an explicit null
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(actual) => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(e)) => a == e,
            _ => actual == expected,
        },
    }
}

fn ordering(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(e)) => a.as_f64()?.partial_cmp(&e.as_f64()?),
        (Value::String(a), Value::String(e)) => Some(a.cmp(e)),
        _ => None,
    }
}

/// SQL `LIKE`, case-insensitive: `%` is any run, `_` any one character
fn ilike(text: &str, pattern: &str) -> bool {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '%' | '_' => {
                translated.push_str(&regex::escape(&literal));
                literal.clear();
                translated.push_str(if c == '%' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    translated.push_str(&regex::escape(&literal));
    translated.push('$');
    RegexBuilder::new(&translated)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .is_ok_and(|re| re.is_match(text))
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
