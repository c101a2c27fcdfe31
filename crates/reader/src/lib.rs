// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ds-reader: queries over the event log under a consistency contract
//!
//! This crate provides:
//! - Point, bulk, filter and aggregate queries with their served position
//! - A known position advanced by notifications and polling
//! - An optional projection cache with memoized filter results
//! - The TCP service and its client

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod error;
mod projection;
pub mod protocol;
mod query;
mod reader;
pub mod server;

pub use client::{ClientError, ReaderClient};
pub use error::ReadError;
pub use projection::Projection;
pub use query::{matching_models, Consistency, Matches, Query, QueryResult};
pub use reader::{Reader, ReaderOptions};
