// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage keys
//!
//! Every stored value is addressed by a [`FqField`] (`collection/id/field`).
//! Keys serialize as their rendered string form so that they can be used
//! directly as JSON map keys and log fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Global logical clock value, one per committed transaction
pub type Position = u64;

/// Model id within a collection
pub type Id = u64;

pub const KEY_SEPARATOR: char = '/';
pub const COLLECTION_MAX_LEN: usize = 32;
pub const FIELD_MAX_LEN: usize = 207;
pub const FQID_MAX_LEN: usize = 48;
pub const COLLECTIONFIELD_MAX_LEN: usize = 239;

/// Errors from key parsing and validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),
    #[error("invalid id: {0:?}")]
    InvalidId(String),
    #[error("invalid field name: {0:?}")]
    InvalidField(String),
    #[error("key {key} is too long (max: {max})")]
    TooLong { key: String, max: usize },
    #[error("malformed key: {0:?}")]
    Malformed(String),
}

fn is_valid_collection(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_valid_field(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
}

/// Validate a field name on its own
pub fn validate_field(field: &str) -> Result<(), KeyError> {
    if !is_valid_field(field) {
        return Err(KeyError::InvalidField(field.to_string()));
    }
    if field.len() > FIELD_MAX_LEN {
        return Err(KeyError::TooLong {
            key: field.to_string(),
            max: FIELD_MAX_LEN,
        });
    }
    Ok(())
}

/// Parse a canonical decimal id: digits only, no sign, no leading zero
pub fn parse_id(raw: &str) -> Result<Id, KeyError> {
    let canonical = !raw.is_empty() && !raw.starts_with('0') && raw.bytes().all(|b| b.is_ascii_digit());
    match raw.parse::<Id>() {
        Ok(id) if canonical => Ok(id),
        _ => Err(KeyError::InvalidId(raw.to_string())),
    }
}

/// A collection (model type) name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Collection(String);

impl Collection {
    pub fn new(name: impl Into<String>) -> Result<Self, KeyError> {
        let name = name.into();
        if !is_valid_collection(&name) {
            return Err(KeyError::InvalidCollection(name));
        }
        if name.len() > COLLECTION_MAX_LEN {
            return Err(KeyError::TooLong {
                key: name,
                max: COLLECTION_MAX_LEN,
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Collection {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Collection {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Collection> for String {
    fn from(value: Collection) -> Self {
        value.0
    }
}

/// One model instance: `collection/id`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fqid {
    pub collection: Collection,
    pub id: Id,
}

impl Fqid {
    pub fn new(collection: Collection, id: Id) -> Result<Self, KeyError> {
        if id == 0 {
            return Err(KeyError::InvalidId("0".to_string()));
        }
        let fqid = Self { collection, id };
        let rendered = fqid.to_string();
        if rendered.len() > FQID_MAX_LEN {
            return Err(KeyError::TooLong {
                key: rendered,
                max: FQID_MAX_LEN,
            });
        }
        Ok(fqid)
    }

    /// Address a field of this model
    pub fn field(&self, field: impl Into<String>) -> Result<FqField, KeyError> {
        FqField::new(self.clone(), field)
    }
}

impl fmt::Display for Fqid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.collection, KEY_SEPARATOR, self.id)
    }
}

impl FromStr for Fqid {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (collection, id) = s
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyError::Malformed(s.to_string()))?;
        Self::new(Collection::new(collection)?, parse_id(id)?)
    }
}

impl TryFrom<String> for Fqid {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fqid> for String {
    fn from(value: Fqid) -> Self {
        value.to_string()
    }
}

/// Fully-qualified field: `collection/id/field`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FqField {
    pub fqid: Fqid,
    pub field: String,
}

impl FqField {
    pub fn new(fqid: Fqid, field: impl Into<String>) -> Result<Self, KeyError> {
        let field = field.into();
        validate_field(&field)?;
        // The collectionfield bound implies the fqfield bound.
        CollectionField::new(fqid.collection.clone(), field.clone())?;
        Ok(Self { fqid, field })
    }

    pub fn collection(&self) -> &Collection {
        &self.fqid.collection
    }

    pub fn collection_field(&self) -> CollectionField {
        CollectionField {
            collection: self.fqid.collection.clone(),
            field: self.field.clone(),
        }
    }
}

impl fmt::Display for FqField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.fqid, KEY_SEPARATOR, self.field)
    }
}

impl FromStr for FqField {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (fqid, field) = s
            .rsplit_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyError::Malformed(s.to_string()))?;
        Self::new(fqid.parse()?, field)
    }
}

impl TryFrom<String> for FqField {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FqField> for String {
    fn from(value: FqField) -> Self {
        value.to_string()
    }
}

/// A field across every model of a collection: `collection/field`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionField {
    pub collection: Collection,
    pub field: String,
}

impl CollectionField {
    pub fn new(collection: Collection, field: impl Into<String>) -> Result<Self, KeyError> {
        let field = field.into();
        validate_field(&field)?;
        let collection_field = Self { collection, field };
        let rendered = collection_field.to_string();
        if rendered.len() > COLLECTIONFIELD_MAX_LEN {
            return Err(KeyError::TooLong {
                key: rendered,
                max: COLLECTIONFIELD_MAX_LEN,
            });
        }
        Ok(collection_field)
    }
}

impl fmt::Display for CollectionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.collection, KEY_SEPARATOR, self.field)
    }
}

impl FromStr for CollectionField {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (collection, field) = s
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyError::Malformed(s.to_string()))?;
        Self::new(Collection::new(collection)?, field)
    }
}

impl TryFrom<String> for CollectionField {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CollectionField> for String {
    fn from(value: CollectionField) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
