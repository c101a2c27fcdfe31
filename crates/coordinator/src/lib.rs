// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ds-coordinator: leased locks and change notifications
//!
//! Writers hold exclusive, expiring leases on lock keys while they re-check
//! and commit a transaction, then publish which fields changed. Readers
//! subscribe to those notifications to learn about new positions.
//!
//! [`MemoryCoordinator`] serves a single process. [`server::serve`] exposes
//! any [`Coordinator`] over TCP and [`RemoteCoordinator`] talks to it.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod bus;
mod client;
mod coordinator;
mod lease;
mod memory;
pub mod protocol;
pub mod server;

pub use bus::{NotificationBus, SubscriberId};
pub use client::RemoteCoordinator;
pub use coordinator::{AcquireOutcome, Coordinator, CoordinatorError, NotificationStream};
pub use lease::{Lease, LeaseTable};
pub use memory::MemoryCoordinator;
