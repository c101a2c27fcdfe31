//! The three services talking over TCP.

use crate::prelude::*;
use ds_coordinator::{server as coordinator_server, MemoryCoordinator, RemoteCoordinator};
use ds_core::CacheMode;
use ds_reader::{Consistency, Query, Reader, ReaderClient, ReaderOptions};
use ds_writer::{bootstrap, SnapshotSource, Writer, WriterClient, WriterOptions};
use serde_json::json;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(2);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

#[tokio::test]
async fn bootstrap_write_and_read_over_the_wire() {
    let stack = Stack::new();

    let (listener, coordinator_addr) = bind().await;
    tokio::spawn(coordinator_server::serve(
        listener,
        Arc::new(MemoryCoordinator::new()),
        TIMEOUT,
        pending(),
    ));
    let remote = || Arc::new(RemoteCoordinator::new(coordinator_addr.clone(), TIMEOUT));

    let (listener, writer_addr) = bind().await;
    let writer = Writer::new(stack.store(), remote(), WriterOptions::default());
    tokio::spawn(ds_writer::server::serve(listener, writer, TIMEOUT, pending()));

    let (listener, reader_addr) = bind().await;
    let reader = Reader::new(
        stack.store(),
        ReaderOptions {
            cache_mode: CacheMode::Projection,
            ..ReaderOptions::default()
        },
    );
    let follower = reader.follow(remote());
    tokio::spawn(ds_reader::server::serve(listener, reader, TIMEOUT, pending()));

    let snapshot = stack.dir.path().join("seed.json");
    std::fs::write(&snapshot, r#"{"users": {"1": {"name": "Alice"}}}"#).unwrap();
    let writer = WriterClient::new(writer_addr, TIMEOUT);
    assert_eq!(
        bootstrap(&writer, &SnapshotSource::File(snapshot)).await.unwrap(),
        1
    );
    assert_eq!(writer.write(set("users/1/name", json!("Bob"))).await.unwrap(), 2);

    let reader = ReaderClient::new(reader_addr, TIMEOUT);
    let name = Query::GetField {
        fqfield: fqfield("users/1/name"),
    };
    let latest = reader.query(name.clone(), Consistency::at_least(2)).await.unwrap();
    let pinned = reader.query(name, Consistency::pinned(1)).await.unwrap();

    assert_eq!((latest.position, latest.data), (2, json!("Bob")));
    assert_eq!((pinned.position, pinned.data), (1, json!("Alice")));
    follower.abort();
}
