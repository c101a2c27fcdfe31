//! Optimistic concurrency and coordinator locks.

use crate::prelude::*;
use ds_core::{Filter, LockDeclaration};
use ds_writer::WriteError;
use serde_json::json;

#[tokio::test]
async fn overlapping_writes_commit_exactly_once() {
    let stack = Stack::new();
    let (a, b) = (stack.writer(), stack.writer());
    let request = |name: &str| {
        set("users/1/name", json!(name)).with_lock(LockDeclaration::field(
            fqfield("users/1/name"),
            0,
        ))
    };

    let (first, second) = tokio::join!(a.write(request("A")), b.write(request("B")));

    let outcomes = [first, second];
    let committed = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "outcomes: {:?}", outcomes);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(WriteError::LockConflict { .. }) | Err(WriteError::ConcurrencyConflict { .. })
    )));
}

#[tokio::test]
async fn stale_declaration_fails_even_without_overlapping_writes() {
    let stack = Stack::new();
    let writer = stack.writer();
    writer.write(set("users/1/name", json!("Alice"))).await.unwrap();
    writer.write(set("users/1/age", json!(31))).await.unwrap();

    // read users/1 at 1, then write a different model
    let request = set("audit/1/note", json!("checked")).with_lock(LockDeclaration::model(
        "users/1".parse().unwrap(),
        1,
    ));
    let result = writer.write(request).await;

    assert!(matches!(
        result,
        Err(WriteError::ConcurrencyConflict {
            as_of: 1,
            position: 2,
            ..
        })
    ));
}

#[tokio::test]
async fn filtered_collection_declaration_ignores_unrelated_models() {
    let stack = Stack::new();
    let writer = stack.writer();
    writer.write(set("users/1/role", json!("admin"))).await.unwrap();
    writer.write(set("users/2/role", json!("guest"))).await.unwrap();
    writer.write(set("users/2/name", json!("Bob"))).await.unwrap();

    let admins = LockDeclaration::collection(
        "users".parse().unwrap(),
        None,
        Some(Filter::eq("role", "admin")),
        1,
    );
    let unaffected = set("reports/1/admins", json!(1)).with_lock(admins.clone());
    assert_eq!(writer.write(unaffected).await.unwrap(), 4);

    writer.write(set("users/2/role", json!("admin"))).await.unwrap();
    let stale = set("reports/1/admins", json!(1)).with_lock(admins);
    assert!(matches!(
        writer.write(stale).await,
        Err(WriteError::ConcurrencyConflict { as_of: 1, .. })
    ));
}

#[tokio::test]
async fn locks_do_not_outlive_transactions() {
    let stack = Stack::new();
    let writer = stack.writer();
    writer.write(set("users/1/name", json!("Alice"))).await.unwrap();
    let _ = writer
        .write(set("users/1/name", json!("Bob")).with_lock(LockDeclaration::field(
            fqfield("users/1/name"),
            0,
        )))
        .await;

    assert_eq!(stack.coordinator.lease_count(), 0);
}
