//! Historical reads are stable.

use crate::prelude::*;
use ds_core::{CacheMode, Filter};
use ds_reader::{Consistency, Query};
use serde_json::json;

#[tokio::test]
async fn pinned_queries_are_repeatable() {
    let stack = Stack::new();
    let writer = stack.writer();
    for (id, role) in [(1, "admin"), (2, "guest"), (3, "admin")] {
        writer
            .write(set(&format!("users/{}/role", id), json!(role)))
            .await
            .unwrap();
    }
    let admins = Query::Count {
        collection: "users".parse().unwrap(),
        filter: Filter::eq("role", "admin"),
    };

    let reader = stack.reader(CacheMode::Projection);
    let before = reader.query(admins.clone(), Consistency::pinned(2)).await.unwrap();
    writer.write(set("users/2/role", json!("admin"))).await.unwrap();
    let after = reader.query(admins.clone(), Consistency::pinned(2)).await.unwrap();
    let latest = reader.query(admins, Consistency::at_least(4)).await.unwrap();

    assert_eq!(before, after);
    assert_eq!(before.data, json!(1));
    assert_eq!(latest.data, json!(3));
}

#[tokio::test]
async fn readers_in_both_modes_agree() {
    let stack = Stack::new();
    let writer = stack.writer();
    writer.write(set("users/1/name", json!("Alice"))).await.unwrap();
    writer.write(set("users/2/name", json!("Bob"))).await.unwrap();
    writer
        .write(ds_writer::WriteRequest::new(vec![ds_writer::Mutation::DeleteModel {
            fqid: "users/1".parse().unwrap(),
        }]))
        .await
        .unwrap();
    let all = Query::GetAll {
        collection: "users".parse().unwrap(),
        fields: None,
    };

    let cached = stack.reader(CacheMode::Projection);
    let uncached = stack.reader(CacheMode::None);
    let a = cached.query(all.clone(), Consistency::at_least(3)).await.unwrap();
    let b = uncached.query(all, Consistency::at_least(3)).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a.data, json!({"2": {"name": "Bob"}}));
}
