// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seeding a log store from a JSON snapshot
//!
//! A snapshot maps collection → id → field → value:
//!
//! ```json
//! { "users": { "1": { "name": "Alice", "age": 31 } } }
//! ```
//!
//! It is submitted as one ordinary transaction with a `ModelAbsent`
//! precondition per model, so seeding twice fails instead of overwriting.

use crate::client::{ClientError, WriterClient};
use crate::request::{Mutation, Precondition, WriteRequest};
use ds_core::key::parse_id;
use ds_core::{Collection, Fqid, KeyError, Position};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

type Snapshot = BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid key in snapshot: {0}")]
    Key(#[from] KeyError),
    #[error("invalid id {id:?} in collection {collection}")]
    Id { collection: String, id: String },
    #[error("snapshot holds no fields")]
    Empty,
    #[error(transparent)]
    Write(#[from] ClientError),
}

/// Where a snapshot comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotSource {
    File(PathBuf),
    Url(String),
}

impl SnapshotSource {
    /// `http://` and `https://` sources are URLs, anything else a path
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            SnapshotSource::Url(source.to_string())
        } else {
            SnapshotSource::File(PathBuf::from(source))
        }
    }

    /// Load the raw snapshot text (blocking)
    pub fn fetch(&self) -> Result<String, BootstrapError> {
        match self {
            SnapshotSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| BootstrapError::Read {
                    path: path.clone(),
                    source,
                })
            }
            SnapshotSource::Url(url) => {
                let fetch_error = |message: String| BootstrapError::Fetch {
                    url: url.clone(),
                    message,
                };
                let mut response = ureq::get(url)
                    .call()
                    .map_err(|e| fetch_error(format!("HTTP request failed: {}", e)))?;
                response
                    .body_mut()
                    .read_to_string()
                    .map_err(|e| fetch_error(format!("failed to read response: {}", e)))
            }
        }
    }
}

impl std::fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotSource::File(path) => write!(f, "{}", path.display()),
            SnapshotSource::Url(url) => f.write_str(url),
        }
    }
}

/// Turn snapshot text into the seeding transaction
pub fn snapshot_request(text: &str) -> Result<WriteRequest, BootstrapError> {
    let snapshot: Snapshot = serde_json::from_str(text)?;
    let mut request = WriteRequest::default();
    for (collection, models) in snapshot {
        let collection = Collection::new(collection)?;
        for (id, fields) in models {
            let id = parse_id(&id).map_err(|_| BootstrapError::Id {
                collection: collection.to_string(),
                id: id.clone(),
            })?;
            let fqid = Fqid::new(collection.clone(), id)?;
            if fields.is_empty() {
                continue;
            }
            for (field, value) in fields {
                request.mutations.push(Mutation::Set {
                    fqfield: fqid.field(field)?,
                    value,
                });
            }
            request
                .preconditions
                .push(Precondition::ModelAbsent { fqid });
        }
    }
    if request.mutations.is_empty() {
        return Err(BootstrapError::Empty);
    }
    Ok(request)
}

/// Load a snapshot and commit it through a writer service
pub async fn bootstrap(
    client: &WriterClient,
    source: &SnapshotSource,
) -> Result<Position, BootstrapError> {
    let fetched = source.clone();
    let text = tokio::task::spawn_blocking(move || fetched.fetch())
        .await
        .map_err(|e| BootstrapError::Read {
            path: PathBuf::from(source.to_string()),
            source: std::io::Error::other(e),
        })??;
    let request = snapshot_request(&text)?;
    let models = request.preconditions.len();
    let fields = request.mutations.len();

    let position = client.write(request).await?;
    info!(%source, models, fields, position, "bootstrap committed");
    Ok(position)
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
