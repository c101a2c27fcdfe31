// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::record::RecordedEvent;
use chrono::Utc;
use ds_core::{Change, TransactionId};
use serde_json::json;
use std::io::Write;
use yare::parameterized;

fn record(position: Position, fqfields: &[&str]) -> PositionRecord {
    PositionRecord::new(
        position,
        TransactionId::new(format!("tx-{}", position)),
        Utc::now(),
        0,
        None,
        fqfields
            .iter()
            .map(|f| RecordedEvent::new(f.parse().unwrap(), Change::Set(json!(position)), 1))
            .collect(),
    )
}

fn write_log(records: &[PositionRecord]) -> (tempfile::NamedTempFile, Vec<u64>) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut offsets = Vec::new();
    let mut offset = 0u64;
    for record in records {
        offsets.push(offset);
        let line = format!("{}\n", record.to_line().unwrap());
        file.write_all(line.as_bytes()).unwrap();
        offset += line.len() as u64;
    }
    (file, offsets)
}

fn positions(cursor: FileCursor) -> Vec<Position> {
    cursor.map(|r| r.unwrap().position).collect()
}

#[parameterized(
    all = { 0, 3, vec![1, 2, 3] },
    middle = { 1, 2, vec![2] },
    tail = { 2, 3, vec![3] },
    nothing = { 3, 3, vec![] },
)]
fn file_cursor_respects_bounds(after: Position, up_to: Position, expected: Vec<Position>) {
    let records = [
        record(1, &["users/1/a"]),
        record(2, &["users/1/a"]),
        record(3, &["users/1/a"]),
    ];
    let (file, offsets) = write_log(&records);
    let offset = offsets.get(after as usize).copied().unwrap_or(0);

    let cursor = FileCursor::new(file.reopen().unwrap(), offset, after, up_to).unwrap();
    assert_eq!(positions(cursor), expected);
}

#[test]
fn file_cursor_rescans_after_a_stale_offset() {
    let records = [
        record(1, &["users/1/a"]),
        record(2, &["users/1/a"]),
        record(3, &["users/1/a"]),
    ];
    let (file, offsets) = write_log(&records);

    // An offset landing on position 3 when position 2 was expected
    let cursor = FileCursor::new(file.reopen().unwrap(), offsets[2], 1, 3).unwrap();
    assert_eq!(positions(cursor), vec![2, 3]);
}

#[test]
fn file_cursor_does_not_read_past_up_to() {
    let records = [record(1, &["users/1/a"])];
    let (mut file, _) = write_log(&records);
    // A line another writer has not finished
    file.write_all(b"{\"position\":2").unwrap();

    let cursor = FileCursor::new(file.reopen().unwrap(), 0, 0, 1).unwrap();
    assert_eq!(positions(cursor), vec![1]);
}

#[test]
fn event_cursor_flattens_and_filters() {
    let records = vec![
        record(1, &["users/1/a", "groups/1/a"]),
        record(2, &["users/2/a", "users/2/b"]),
    ];
    let cursor = EventCursor::new(
        LogCursor::new(records.into_iter().map(Ok)),
        EventSelector::Collection("users".parse().unwrap()),
    );

    let fields: Vec<_> = cursor
        .map(|e| {
            let e = e.unwrap();
            (e.position, e.fqfield.to_string())
        })
        .collect();
    assert_eq!(
        fields,
        vec![
            (1, "users/1/a".to_string()),
            (2, "users/2/a".to_string()),
            (2, "users/2/b".to_string()),
        ]
    );
}

#[parameterized(
    all = { EventSelector::All, true },
    collection = { EventSelector::Collection("users".parse().unwrap()), true },
    other_collection = { EventSelector::Collection("groups".parse().unwrap()), false },
    collection_field = { EventSelector::CollectionField("users/name".parse().unwrap()), true },
    model = { EventSelector::Model("users/1".parse().unwrap()), true },
    other_model = { EventSelector::Model("users/2".parse().unwrap()), false },
    field = { EventSelector::Field("users/1/name".parse().unwrap()), true },
    other_field = { EventSelector::Field("users/1/age".parse().unwrap()), false },
)]
fn selector_matches(selector: EventSelector, expected: bool) {
    let event = Event {
        position: 1,
        fqfield: "users/1/name".parse().unwrap(),
        change: Change::Tombstone,
        migration_index: 1,
    };
    assert_eq!(selector.matches(&event), expected);
}
