// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use ds_coordinator::{CoordinatorError, MemoryCoordinator, NotificationStream};
use ds_core::Notification;

const TTL: Duration = Duration::from_secs(10);
const TIMEOUT: Duration = Duration::from_secs(1);

fn keys() -> Vec<LockKey> {
    vec![LockKey::from("users/1".parse::<ds_core::Fqid>().unwrap())]
}

#[tokio::test]
async fn release_frees_the_keys() {
    let coordinator = Arc::new(MemoryCoordinator::new());
    let guard = LockGuard::acquire(
        Arc::clone(&coordinator),
        keys(),
        TransactionId::new("a"),
        TTL,
        TIMEOUT,
    )
    .await
    .unwrap();
    assert_eq!(coordinator.lease_count(), 1);

    guard.release().await;
    assert_eq!(coordinator.lease_count(), 0);
}

#[tokio::test]
async fn busy_keys_are_a_lock_conflict() {
    let coordinator = Arc::new(MemoryCoordinator::new());
    let held = LockGuard::acquire(
        Arc::clone(&coordinator),
        keys(),
        TransactionId::new("a"),
        TTL,
        TIMEOUT,
    )
    .await
    .unwrap();

    let result = LockGuard::acquire(
        Arc::clone(&coordinator),
        keys(),
        TransactionId::new("b"),
        TTL,
        TIMEOUT,
    )
    .await;

    match result {
        Err(WriteError::LockConflict { holder, .. }) => assert_eq!(holder.as_str(), "a"),
        Err(other) => panic!("expected lock conflict, got {:?}", other),
        Ok(_) => panic!("expected lock conflict"),
    }
    // the loser's failure must not release the winner's lease
    assert_eq!(coordinator.holder(&keys()[0]), Some(TransactionId::new("a")));
    held.release().await;
}

#[tokio::test]
async fn dropped_guard_releases_in_the_background() {
    let coordinator = Arc::new(MemoryCoordinator::new());
    let guard = LockGuard::acquire(
        Arc::clone(&coordinator),
        keys(),
        TransactionId::new("a"),
        TTL,
        TIMEOUT,
    )
    .await
    .unwrap();

    drop(guard);
    for _ in 0..50 {
        if coordinator.lease_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(coordinator.lease_count(), 0);
}

/// Grants leases but answers too late
#[derive(Default)]
struct SlowCoordinator {
    inner: MemoryCoordinator,
}

#[async_trait]
impl Coordinator for SlowCoordinator {
    async fn acquire(
        &self,
        keys: &[LockKey],
        holder: &TransactionId,
        ttl: Duration,
    ) -> Result<AcquireOutcome, CoordinatorError> {
        let outcome = self.inner.acquire(keys, holder, ttl).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        outcome
    }

    async fn release(
        &self,
        keys: &[LockKey],
        holder: &TransactionId,
    ) -> Result<(), CoordinatorError> {
        self.inner.release(keys, holder).await
    }

    async fn publish(&self, notification: Notification) -> Result<(), CoordinatorError> {
        self.inner.publish(notification).await
    }

    async fn subscribe(&self) -> Result<NotificationStream, CoordinatorError> {
        self.inner.subscribe().await
    }
}

#[tokio::test]
async fn acquire_timeout_releases_whatever_was_granted() {
    let coordinator = Arc::new(SlowCoordinator::default());

    let result = LockGuard::acquire(
        Arc::clone(&coordinator),
        keys(),
        TransactionId::new("a"),
        TTL,
        Duration::from_millis(50),
    )
    .await;

    assert!(matches!(result, Err(WriteError::LockTimeout)));
    assert_eq!(coordinator.inner.lease_count(), 0);
}
