// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ds-storage: the durable event log and its replay
//!
//! ## Architecture
//!
//! ```text
//! AppendRequest → LogStore::append → PositionRecord → disk (events.jsonl)
//!                                                        ↓
//!                          LogCursor → EventCursor → fold → MaterializedState
//! ```
//!
//! The log is the source of truth. One line holds one committed position
//! with all of its events, so a transaction is visible entirely or not at
//! all. State is always derived by folding events up to a position.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod cursor;
mod index;
mod memory;
mod migration;
mod record;
mod state;
mod store;
mod wal;

pub use cursor::{EventCursor, EventSelector, LogCursor};
pub use memory::MemoryLogStore;
pub use migration::{Migration, MigrationError, Migrations};
pub use record::{PositionRecord, RecordedEvent};
pub use state::{replay, ApplyError, MaterializedState, ModelStatus};
pub use store::{AppendOutcome, AppendRequest, LogStore, RejectReason, StoreError};
pub use wal::FileLogStore;
