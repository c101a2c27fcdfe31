//! The end-to-end consistency scenario.

use crate::prelude::*;
use ds_core::{CacheMode, LockDeclaration};
use ds_reader::{Consistency, Query};
use ds_writer::WriteError;
use serde_json::json;

fn name() -> Query {
    Query::GetField {
        fqfield: fqfield("users/1/name"),
    }
}

async fn scenario(cache_mode: CacheMode) {
    let stack = Stack::new();
    let writer = stack.writer();
    let reader = stack.reader(cache_mode);
    let follower = reader.follow(std::sync::Arc::clone(&stack.coordinator));

    assert_eq!(writer.write(set("users/1/name", json!("Alice"))).await.unwrap(), 1);
    let read = reader.query(name(), Consistency::at_least(1)).await.unwrap();
    assert_eq!((read.position, read.data), (1, json!("Alice")));

    let stale = set("users/1/name", json!("Bob"))
        .with_lock(LockDeclaration::field(fqfield("users/1/name"), 0));
    assert!(matches!(
        writer.write(stale).await,
        Err(WriteError::ConcurrencyConflict { .. })
    ));

    let fresh = set("users/1/name", json!("Bob"))
        .with_lock(LockDeclaration::field(fqfield("users/1/name"), 1));
    assert_eq!(writer.write(fresh).await.unwrap(), 2);

    let pinned = reader.query(name(), Consistency::pinned(1)).await.unwrap();
    assert_eq!((pinned.position, pinned.data), (1, json!("Alice")));
    let latest = reader.query(name(), Consistency::at_least(2)).await.unwrap();
    assert_eq!((latest.position, latest.data), (2, json!("Bob")));

    follower.abort();
}

#[tokio::test]
async fn alice_then_bob_with_projection() {
    scenario(CacheMode::Projection).await;
}

#[tokio::test]
async fn alice_then_bob_without_cache() {
    scenario(CacheMode::None).await;
}

#[tokio::test]
async fn reported_positions_never_exceed_the_log() {
    let stack = Stack::new();
    let writer = stack.writer();
    let reader = stack.reader(CacheMode::Projection);
    for i in 0..5 {
        writer.write(set("users/1/age", json!(i))).await.unwrap();
        let result = reader.query(name(), Consistency::latest()).await.unwrap();
        let head = ds_storage::LogStore::max_position(&*stack.store()).unwrap();
        assert!(result.position <= head);
    }
}
