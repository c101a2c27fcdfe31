//! Position allocation across writers sharing one log.

use crate::prelude::*;
use ds_core::CacheMode;
use ds_reader::{Consistency, Query};
use ds_storage::{EventSelector, LogStore};
use serde_json::json;

#[tokio::test]
async fn positions_are_gapless_across_writers() {
    let stack = Stack::new();
    let writers = [stack.writer(), stack.writer(), stack.writer()];

    let mut tasks = Vec::new();
    for (w, writer) in writers.iter().enumerate() {
        for i in 0..5 {
            let writer = writer.clone();
            let field = format!("counters/{}/value", w * 10 + i + 1);
            tasks.push(tokio::spawn(async move {
                writer.write(set(&field, json!(i))).await.unwrap()
            }));
        }
    }
    let mut positions = Vec::new();
    for task in tasks {
        positions.push(task.await.unwrap());
    }
    positions.sort_unstable();

    assert_eq!(positions, (1..=15).collect::<Vec<_>>());
    let store = stack.store();
    let logged: Vec<u64> = store
        .records(0, 15)
        .unwrap()
        .map(|record| record.unwrap().position)
        .collect();
    assert_eq!(logged, positions);
}

#[tokio::test]
async fn tombstones_stay_in_the_log() {
    let stack = Stack::new();
    let writer = stack.writer();
    writer.write(set("users/1/name", json!("Alice"))).await.unwrap();
    writer
        .write(ds_writer::WriteRequest::new(vec![ds_writer::Mutation::Delete {
            fqfield: fqfield("users/1/name"),
        }]))
        .await
        .unwrap();

    let store = stack.store();
    let events: Vec<_> = store
        .events(EventSelector::Field(fqfield("users/1/name")), 0, 2)
        .unwrap()
        .map(|e| e.unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert!(events[1].change.is_tombstone());

    let reader = stack.reader(CacheMode::Projection);
    let get = |position| {
        reader.query(
            Query::GetField {
                fqfield: fqfield("users/1/name"),
            },
            Consistency::pinned(position),
        )
    };
    assert_eq!(get(1).await.unwrap().data, json!("Alice"));
    assert_eq!(get(2).await.unwrap().data, serde_json::Value::Null);
}
