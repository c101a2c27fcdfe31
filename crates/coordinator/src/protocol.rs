// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator wire messages
//!
//! One request per connection. `Subscribe` is answered with `Subscribed`
//! and the connection then carries `Notification` messages until either
//! side closes it.

use ds_core::protocol::WireError;
use ds_core::{LockKey, Notification, TransactionId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Acquire {
        keys: Vec<LockKey>,
        holder: TransactionId,
        #[serde(with = "humantime_serde")]
        ttl: Duration,
    },
    Release {
        keys: Vec<LockKey>,
        holder: TransactionId,
    },
    Publish {
        notification: Notification,
    },
    Subscribe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Acquired,
    Busy {
        key: LockKey,
        holder: TransactionId,
    },
    Released,
    Published,
    Subscribed,
    Notification {
        notification: Notification,
    },
    Error {
        error: WireError,
    },
}
