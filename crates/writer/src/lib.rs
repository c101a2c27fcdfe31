// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ds-writer: transactional writes under optimistic concurrency
//!
//! A transaction leases its keys from the coordinator, re-checks the
//! positions it read against the log, appends one record and publishes a
//! notification. Locks are held only around the commit itself.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bootstrap;
mod client;
mod error;
mod guard;
pub mod protocol;
mod request;
pub mod server;
mod transaction;
mod writer;

pub use bootstrap::{bootstrap, BootstrapError, SnapshotSource};
pub use client::{ClientError, WriterClient};
pub use error::WriteError;
pub use guard::LockGuard;
pub use request::{Mutation, Precondition, WriteRequest};
pub use writer::{Writer, WriterOptions};
