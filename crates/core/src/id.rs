// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction identifiers
//!
//! Every write transaction gets an id that doubles as its lock owner and as
//! the idempotency key of its log record.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier of one write transaction
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates transaction identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> TransactionId;
}

/// UUID-based generator for production use
#[derive(Clone, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> TransactionId {
        TransactionId(uuid::Uuid::new_v4().to_string())
    }
}

/// Sequential generator for tests
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("tx")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> TransactionId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        TransactionId(format!("{}-{}", self.prefix, n))
    }
}
