// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reader wire messages, one request per connection

use crate::query::{Consistency, Query, QueryResult};
use ds_core::protocol::WireError;
use ds_core::Position;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    /// Report the known position without reconciling
    Position,
    Query {
        query: Query,
        #[serde(default)]
        consistency: Consistency,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Position { position: Position },
    Result { result: QueryResult },
    Error { error: WireError },
}
