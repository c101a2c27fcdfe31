// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::request::{Mutation, Precondition};
use async_trait::async_trait;
use ds_coordinator::{
    AcquireOutcome, CoordinatorError, MemoryCoordinator, NotificationStream,
};
use ds_core::{LockDeclaration, LockKey, SequentialIdGen};
use ds_storage::{replay, EventSelector, FileLogStore, MemoryLogStore};
use serde_json::{json, Value};

type TestWriter<C = MemoryCoordinator> = Writer<MemoryLogStore, C, SequentialIdGen>;

fn writer() -> (TestWriter, Arc<MemoryCoordinator>) {
    let coordinator = Arc::new(MemoryCoordinator::new());
    let writer = Writer::with_ids(
        Arc::new(MemoryLogStore::new()),
        Arc::clone(&coordinator),
        WriterOptions::default(),
        SequentialIdGen::default(),
    );
    (writer, coordinator)
}

fn set(fqfield: &str, value: Value) -> Mutation {
    Mutation::Set {
        fqfield: fqfield.parse().unwrap(),
        value,
    }
}

fn name_at(store: &MemoryLogStore, position: Position) -> Option<Value> {
    let state = replay(store, EventSelector::All, position, &Migrations::none()).unwrap();
    state.field(&"users/1/name".parse().unwrap()).cloned()
}

#[tokio::test]
async fn positions_increase_by_one_per_transaction() {
    let (writer, _) = writer();

    let first = writer
        .write(WriteRequest::new(vec![set("users/1/name", json!("Alice"))]))
        .await
        .unwrap();
    let second = writer
        .write(WriteRequest::new(vec![
            set("users/2/name", json!("Bob")),
            set("users/2/age", json!(30)),
        ]))
        .await
        .unwrap();

    assert_eq!((first, second), (1, 2));
}

#[tokio::test]
async fn commit_publishes_the_touched_fields() {
    let (writer, coordinator) = writer();
    let mut notifications = coordinator.subscribe().await.unwrap();

    let position = writer
        .write(WriteRequest::new(vec![
            set("users/1/name", json!("Alice")),
            set("users/1/age", json!(31)),
        ]))
        .await
        .unwrap();

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.position, position);
    let fields: Vec<String> = notification.fields.iter().map(|f| f.to_string()).collect();
    assert_eq!(fields, vec!["users/1/age", "users/1/name"]);
}

#[tokio::test]
async fn locks_are_released_after_every_outcome() {
    let (writer, coordinator) = writer();
    writer
        .write(WriteRequest::new(vec![set("users/1/name", json!("Alice"))]))
        .await
        .unwrap();

    let stale = WriteRequest::new(vec![set("users/1/name", json!("Bob"))])
        .with_lock(LockDeclaration::field("users/1/name".parse().unwrap(), 0));
    assert!(writer.write(stale).await.is_err());

    assert_eq!(coordinator.lease_count(), 0);
}

#[tokio::test]
async fn stale_declaration_is_a_concurrency_conflict() {
    let (writer, _) = writer();
    writer
        .write(WriteRequest::new(vec![set("users/1/name", json!("Alice"))]))
        .await
        .unwrap();

    let stale = WriteRequest::new(vec![set("users/1/name", json!("Bob"))])
        .with_lock(LockDeclaration::field("users/1/name".parse().unwrap(), 0));
    let result = writer.write(stale).await;
    assert!(matches!(
        result,
        Err(WriteError::ConcurrencyConflict {
            as_of: 0,
            position: 1,
            ..
        })
    ));

    let fresh = WriteRequest::new(vec![set("users/1/name", json!("Bob"))])
        .with_lock(LockDeclaration::field("users/1/name".parse().unwrap(), 1));
    assert_eq!(writer.write(fresh).await.unwrap(), 2);

    assert_eq!(name_at(writer.store(), 1), Some(json!("Alice")));
    assert_eq!(name_at(writer.store(), 2), Some(json!("Bob")));
}

#[tokio::test]
async fn declaration_beyond_head_is_invalid() {
    let (writer, _) = writer();
    let request = WriteRequest::new(vec![set("users/1/name", json!("Bob"))])
        .with_lock(LockDeclaration::field("users/1/name".parse().unwrap(), 3));

    let result = writer.write(request).await;

    assert!(matches!(result, Err(WriteError::InvalidRequest(_))));
}

#[tokio::test]
async fn failed_precondition_appends_nothing() {
    let (writer, _) = writer();
    writer
        .write(WriteRequest::new(vec![set("users/1/name", json!("Alice"))]))
        .await
        .unwrap();

    let request = WriteRequest::new(vec![set("users/1/name", json!("Eve"))])
        .with_precondition(Precondition::ModelAbsent {
            fqid: "users/1".parse().unwrap(),
        });
    let result = writer.write(request).await;

    assert!(matches!(result, Err(WriteError::PreconditionFailed(_))));
    assert_eq!(writer.store().max_position().unwrap(), 1);
}

#[tokio::test]
async fn held_keys_are_a_lock_conflict() {
    let (writer, coordinator) = writer();
    let other = TransactionId::new("other");
    let key = LockKey::from("users".parse::<Collection>().unwrap());
    let outcome = coordinator
        .acquire(std::slice::from_ref(&key), &other, Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(outcome, AcquireOutcome::Acquired);

    let result = writer
        .write(WriteRequest::new(vec![set("users/1/name", json!("Bob"))]))
        .await;

    match result {
        Err(WriteError::LockConflict { holder, .. }) => assert_eq!(holder, other),
        other => panic!("expected lock conflict, got {:?}", other),
    }
    assert_eq!(writer.store().max_position().unwrap(), 0);
}

#[tokio::test]
async fn overlapping_concurrent_writes_commit_once() {
    let (writer, _) = writer();
    let request = |name: &str| {
        WriteRequest::new(vec![set("users/1/name", json!(name))])
            .with_lock(LockDeclaration::model("users/1".parse().unwrap(), 0))
    };

    let (a, b) = tokio::join!(writer.write(request("A")), writer.write(request("B")));

    let committed = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "results: {:?} / {:?}", a, b);
    let failure = if a.is_err() { a } else { b };
    assert!(matches!(
        failure,
        Err(WriteError::LockConflict { .. }) | Err(WriteError::ConcurrencyConflict { .. })
    ));
    assert_eq!(writer.store().max_position().unwrap(), 1);
}

#[tokio::test]
async fn delete_model_removes_every_field() {
    let (writer, _) = writer();
    writer
        .write(WriteRequest::new(vec![
            set("users/1/name", json!("Alice")),
            set("users/1/age", json!(31)),
        ]))
        .await
        .unwrap();

    let position = writer
        .write(WriteRequest::new(vec![Mutation::DeleteModel {
            fqid: "users/1".parse().unwrap(),
        }]))
        .await
        .unwrap();

    let state = replay(
        &**writer.store(),
        EventSelector::All,
        position,
        &Migrations::none(),
    )
    .unwrap();
    assert!(!state.exists(&"users/1".parse().unwrap()));
    assert_eq!(name_at(writer.store(), 1), Some(json!("Alice")));
}

#[tokio::test]
async fn batch_commits_at_one_position() {
    let (writer, _) = writer();
    writer
        .write(WriteRequest::new(vec![set("users/1/name", json!("Alice"))]))
        .await
        .unwrap();

    let position = writer
        .write_batch(vec![
            WriteRequest::new(vec![set("users/1/name", json!("Bob"))]),
            WriteRequest::new(vec![Mutation::ListUpdate {
                fqfield: "users/1/tags".parse().unwrap(),
                add: vec![json!("new")],
                remove: vec![],
            }]),
        ])
        .await
        .unwrap();

    assert_eq!(position, 2);
    assert_eq!(writer.store().max_position().unwrap(), 2);
    let state = replay(&**writer.store(), EventSelector::All, 2, &Migrations::none()).unwrap();
    assert_eq!(state.field(&"users/1/name".parse().unwrap()), Some(&json!("Bob")));
    assert_eq!(state.field(&"users/1/tags".parse().unwrap()), Some(&json!(["new"])));
}

#[tokio::test]
async fn failing_batch_member_commits_nothing() {
    let (writer, _) = writer();
    writer
        .write(WriteRequest::new(vec![set("users/1/name", json!("Alice"))]))
        .await
        .unwrap();

    let result = writer
        .write_batch(vec![
            WriteRequest::new(vec![set("users/2/name", json!("Bob"))]),
            WriteRequest::new(vec![set("users/1/name", json!("Eve"))]).with_precondition(
                Precondition::ModelAbsent {
                    fqid: "users/1".parse().unwrap(),
                },
            ),
        ])
        .await;

    assert!(matches!(result, Err(WriteError::PreconditionFailed(_))));
    assert_eq!(writer.store().max_position().unwrap(), 1);
}

#[tokio::test]
async fn reserve_ids_requires_a_positive_amount() {
    let (writer, _) = writer();
    let users: Collection = "users".parse().unwrap();

    assert!(matches!(
        writer.reserve_ids(users.clone(), 0).await,
        Err(WriteError::InvalidRequest(_))
    ));
    assert_eq!(writer.reserve_ids(users.clone(), 3).await.unwrap(), vec![1, 2, 3]);
    assert_eq!(writer.reserve_ids(users, 1).await.unwrap(), vec![4]);
}

#[tokio::test]
async fn truncate_requires_dev_mode() {
    let (writer, _) = writer();
    writer
        .write(WriteRequest::new(vec![set("users/1/name", json!("Alice"))]))
        .await
        .unwrap();

    assert!(matches!(
        writer.truncate_db().await,
        Err(WriteError::DevModeOnly(_))
    ));

    let options = WriterOptions {
        dev_mode: true,
        ..WriterOptions::default()
    };
    let dev = Writer::with_ids(
        Arc::clone(writer.store()),
        Arc::new(MemoryCoordinator::new()),
        options,
        SequentialIdGen::new("dev"),
    );
    dev.truncate_db().await.unwrap();
    assert_eq!(writer.store().max_position().unwrap(), 0);
}

#[tokio::test]
async fn history_information_can_be_erased() {
    let (writer, _) = writer();
    let mut request = WriteRequest::new(vec![set("users/1/name", json!("Alice"))]);
    request.information = Some(json!({"action": "create user"}));
    writer.write(request).await.unwrap();

    writer.delete_history_information().await.unwrap();

    let record = writer
        .store()
        .records(0, 1)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(record.information, None);
    assert_eq!(name_at(writer.store(), 1), Some(json!("Alice")));
}

/// Leases work, publishing always fails
#[derive(Default)]
struct MutedCoordinator {
    inner: MemoryCoordinator,
}

#[async_trait]
impl Coordinator for MutedCoordinator {
    async fn acquire(
        &self,
        keys: &[LockKey],
        holder: &TransactionId,
        ttl: Duration,
    ) -> Result<AcquireOutcome, CoordinatorError> {
        self.inner.acquire(keys, holder, ttl).await
    }

    async fn release(
        &self,
        keys: &[LockKey],
        holder: &TransactionId,
    ) -> Result<(), CoordinatorError> {
        self.inner.release(keys, holder).await
    }

    async fn publish(&self, _notification: Notification) -> Result<(), CoordinatorError> {
        Err(CoordinatorError::Unreachable(std::io::Error::other(
            "connection refused",
        )))
    }

    async fn subscribe(&self) -> Result<NotificationStream, CoordinatorError> {
        self.inner.subscribe().await
    }
}

#[tokio::test]
async fn failed_publish_still_reports_the_commit() {
    let coordinator = Arc::new(MutedCoordinator::default());
    let writer: TestWriter<MutedCoordinator> = Writer::with_ids(
        Arc::new(MemoryLogStore::new()),
        Arc::clone(&coordinator),
        WriterOptions::default(),
        SequentialIdGen::default(),
    );

    let position = writer
        .write(WriteRequest::new(vec![set("users/1/name", json!("Alice"))]))
        .await
        .unwrap();

    assert_eq!(position, 1);
    assert_eq!(coordinator.inner.lease_count(), 0);
}

#[tokio::test]
async fn file_store_writers_share_one_log() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(MemoryCoordinator::new());
    let first = Writer::new(
        Arc::new(FileLogStore::open(dir.path()).unwrap()),
        Arc::clone(&coordinator),
        WriterOptions::default(),
    );
    let second = Writer::new(
        Arc::new(FileLogStore::open(dir.path()).unwrap()),
        Arc::clone(&coordinator),
        WriterOptions::default(),
    );

    let a = first
        .write(WriteRequest::new(vec![set("users/1/name", json!("Alice"))]))
        .await
        .unwrap();
    let stale = WriteRequest::new(vec![set("users/1/name", json!("Bob"))])
        .with_lock(LockDeclaration::field("users/1/name".parse().unwrap(), 0));
    let conflict = second.write(stale).await;
    let b = second
        .write(WriteRequest::new(vec![set("users/2/name", json!("Carol"))]))
        .await
        .unwrap();

    assert_eq!((a, b), (1, 2));
    assert!(matches!(
        conflict,
        Err(WriteError::ConcurrencyConflict { .. })
    ));
}
