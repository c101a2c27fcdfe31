// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn key(scope: &str, raw: &str) -> LockKey {
    match scope {
        "collection" => LockKey::from(raw.parse::<Collection>().unwrap()),
        "model" => LockKey::from(raw.parse::<Fqid>().unwrap()),
        _ => LockKey::from(raw.parse::<FqField>().unwrap()),
    }
}

#[parameterized(
    same_field = { key("field", "users/1/name"), key("field", "users/1/name"), true },
    sibling_fields = { key("field", "users/1/name"), key("field", "users/1/email"), false },
    field_in_model = { key("field", "users/1/name"), key("model", "users/1"), true },
    field_other_model = { key("field", "users/1/name"), key("model", "users/2"), false },
    model_in_collection = { key("model", "users/1"), key("collection", "users"), true },
    field_in_collection = { key("collection", "users"), key("field", "users/9/x"), true },
    other_collection = { key("collection", "groups"), key("field", "users/9/x"), false },
    distinct_models = { key("model", "users/1"), key("model", "users/2"), false },
)]
fn lock_key_overlap(a: LockKey, b: LockKey, expected: bool) {
    assert_eq!(a.overlaps(&b), expected);
    assert_eq!(b.overlaps(&a), expected, "overlap must be symmetric");
}

#[test]
fn lock_key_renders_like_its_target() {
    assert_eq!(key("field", "users/1/name").to_string(), "users/1/name");
    assert_eq!(key("model", "users/1").to_string(), "users/1");
    assert_eq!(key("collection", "users").to_string(), "users");
}

#[test]
fn declaration_targets_map_to_lock_keys() {
    let field = LockDeclaration::field("users/1/name".parse().unwrap(), 4);
    let model = LockDeclaration::model("users/1".parse().unwrap(), 4);
    let collection = LockDeclaration::collection("users".parse().unwrap(), None, None, 4);

    assert_eq!(field.target.lock_key(), key("field", "users/1/name"));
    assert_eq!(model.target.lock_key(), key("model", "users/1"));
    assert_eq!(collection.target.lock_key(), key("collection", "users"));
}

#[test]
fn collection_target_covers_only_its_field() {
    let target = LockTarget::Collection {
        collection: "users".parse().unwrap(),
        field: Some("name".to_string()),
        filter: None,
    };

    assert!(target.covers(&"users/3/name".parse().unwrap()));
    assert!(!target.covers(&"users/3/email".parse().unwrap()));
    assert!(!target.covers(&"groups/3/name".parse().unwrap()));
}

#[test]
fn declaration_wire_format() {
    let declaration: LockDeclaration = serde_json::from_value(json!({
        "target": {
            "scope": "collection",
            "collection": "users",
            "filter": {"field": {"field": "active", "operator": "=", "value": true}}
        },
        "as_of": 7
    }))
    .unwrap();

    assert_eq!(declaration.as_of, 7);
    assert!(declaration.target.filter().is_some());
    assert_eq!(declaration.target.to_string(), "users");
}
