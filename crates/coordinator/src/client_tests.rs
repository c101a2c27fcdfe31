// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::memory::MemoryCoordinator;
use crate::server;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const TIMEOUT: Duration = Duration::from_secs(2);

struct Service {
    client: RemoteCoordinator,
    coordinator: MemoryCoordinator,
    _shutdown: oneshot::Sender<()>,
}

async fn start() -> Service {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let coordinator = MemoryCoordinator::new();
    let (shutdown, stop) = oneshot::channel::<()>();
    let served = Arc::new(coordinator.clone());
    tokio::spawn(async move {
        server::serve(listener, served, TIMEOUT, async {
            let _ = stop.await;
        })
        .await
    });
    Service {
        client: RemoteCoordinator::new(addr.to_string(), TIMEOUT),
        coordinator,
        _shutdown: shutdown,
    }
}

fn key(raw: &str) -> LockKey {
    LockKey::from(raw.parse::<ds_core::FqField>().unwrap())
}

#[tokio::test]
async fn ping_over_tcp() {
    let service = start().await;
    service.client.ping().await.unwrap();
}

#[tokio::test]
async fn leases_round_trip_over_tcp() {
    let service = start().await;
    let a = TransactionId::new("a");
    let b = TransactionId::new("b");
    let ttl = Duration::from_secs(5);

    let first = service
        .client
        .acquire(&[key("users/1/name")], &a, ttl)
        .await
        .unwrap();
    assert_eq!(first, AcquireOutcome::Acquired);

    let second = service
        .client
        .acquire(&[key("users/1/name")], &b, ttl)
        .await
        .unwrap();
    assert_eq!(
        second,
        AcquireOutcome::Busy {
            key: key("users/1/name"),
            holder: a.clone(),
        }
    );

    service.client.release(&[key("users/1/name")], &a).await.unwrap();
    assert_eq!(service.coordinator.lease_count(), 0);
}

#[tokio::test]
async fn subscription_streams_notifications() {
    let service = start().await;
    let mut stream = service.client.subscribe().await.unwrap();

    // the server registers the subscriber before acknowledging
    assert_eq!(service.coordinator.subscriber_count(), 1);

    service
        .client
        .publish(Notification::new(3, vec!["users/1/name".parse().unwrap()]))
        .await
        .unwrap();

    let received = tokio::time::timeout(TIMEOUT, stream.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.position, 3);
}

#[tokio::test]
async fn unreachable_service_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RemoteCoordinator::new(addr.to_string(), Duration::from_millis(200));
    assert!(client.ping().await.is_err());
}
