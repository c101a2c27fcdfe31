// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ds-core: shared vocabulary of the datastore services
//!
//! This crate provides:
//! - Key types (collection, fqid, fqfield, collectionfield) with validation
//! - Field-level events, notifications and lock descriptors
//! - Filter expressions evaluated against materialized models
//! - Configuration, logging setup and the JSON-lines wire helpers
//! - Clock and id abstractions for deterministic tests

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod config;
pub mod event;
pub mod filter;
pub mod id;
pub mod key;
pub mod lock;
pub mod logging;
pub mod protocol;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{CacheMode, Config, ConfigError, LaggingPolicy};
pub use event::{Change, Event, Model, Notification};
pub use filter::{Filter, FilterError, Operator};
pub use id::{IdGen, SequentialIdGen, TransactionId, UuidIdGen};
pub use key::{Collection, CollectionField, FqField, Fqid, Id, KeyError, Position};
pub use lock::{LockDeclaration, LockKey, LockTarget};
