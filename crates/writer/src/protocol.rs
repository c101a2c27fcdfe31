// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writer wire messages, one request per connection

use crate::request::WriteRequest;
use ds_core::protocol::WireError;
use ds_core::{Collection, Id, Position};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Write { request: WriteRequest },
    WriteBatch { requests: Vec<WriteRequest> },
    ReserveIds { collection: Collection, amount: u32 },
    DeleteHistoryInformation,
    TruncateDb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Written { position: Position },
    Ids { ids: Vec<Id> },
    Ok,
    Error { error: WireError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_request_wire_shape() {
        let line = json!({
            "type": "write",
            "request": {
                "mutations": [
                    {"type": "set", "fqfield": "users/1/name", "value": "Bob"},
                    {"type": "delete", "fqfield": "users/1/nick"}
                ],
                "locks": [
                    {"target": {"scope": "field", "fqfield": "users/1/name"}, "as_of": 1}
                ]
            }
        });

        let request: Request = serde_json::from_value(line).unwrap();

        let Request::Write { request } = request else {
            panic!("expected a write");
        };
        assert_eq!(request.mutations.len(), 2);
        assert_eq!(request.locks[0].as_of, 1);
        assert_eq!(request.user_id, 0);
        assert!(request.preconditions.is_empty());
    }

    #[test]
    fn write_batch_wire_shape() {
        let line = json!({
            "type": "write_batch",
            "requests": [
                {"mutations": [{"type": "set", "fqfield": "users/1/name", "value": "Bob"}]},
                {"mutations": [{"type": "list_update", "fqfield": "users/1/tags", "remove": [1]}]}
            ]
        });

        let request: Request = serde_json::from_value(line).unwrap();

        let Request::WriteBatch { requests } = request else {
            panic!("expected a batch");
        };
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn errors_carry_kind_and_retryability() {
        let response = Response::Error {
            error: WireError {
                kind: "lock_conflict".to_string(),
                message: "busy".to_string(),
                retryable: true,
            },
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["error"]["kind"], "lock_conflict");
        assert_eq!(value["error"]["retryable"], true);
    }
}
