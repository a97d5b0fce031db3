#![allow(clippy::unwrap_used, clippy::expect_used)]

use datakit_query::eval::{execute, filter_records};
use datakit_query::{Condition, Filters, Query, Record};
use serde_json::{Value, json};

fn fixture() -> Vec<Record> {
    [
        json!({"_id": "r1", "a": 1, "b": 9, "c": 3}),
        json!({"_id": "r2", "a": 9, "b": 2, "c": 3}),
        json!({"_id": "r3", "a": 1, "b": 2, "c": 9}),
        json!({"_id": "r4", "a": 9, "b": 9, "c": 3}),
    ]
    .into_iter()
    .map(|v| v.as_object().cloned().unwrap())
    .collect()
}

fn ids(rows: &[Record]) -> Vec<&str> {
    rows.iter().map(|r| r["_id"].as_str().unwrap()).collect()
}

#[test]
fn or_then_implicit_and_is_left_associative() {
    let filters: Filters =
        serde_json::from_value(json!([["a", "=", 1], "or", ["b", "=", 2], ["c", "=", 3]])).unwrap();

    let rows = fixture();
    let matched = filter_records(&rows, filters.compile().as_ref()).unwrap();

    // r3 satisfies a==1 and b==2 but not c==3; a grouped reading would include it.
    assert_eq!(ids(&matched), vec!["r1", "r2"]);
}

#[test]
fn and_then_or_widens_after_the_conjunction() {
    // (a == 1 and c == 3) or b == 2
    let filters = Filters::new()
        .and(Condition::eq("a", 1))
        .and(Condition::eq("c", 3))
        .or(Condition::eq("b", 2));

    let rows = fixture();
    let matched = filter_records(&rows, filters.compile().as_ref()).unwrap();

    assert_eq!(ids(&matched), vec!["r1", "r2", "r3"]);
}

#[test]
fn empty_filters_match_everything() {
    let rows = fixture();
    let matched = filter_records(&rows, Filters::new().compile().as_ref()).unwrap();

    assert_eq!(matched.len(), 4);
}

#[test]
fn full_query_over_fixture() {
    let query: Query = serde_json::from_value(json!({
        "filters": [["c", "=", 3]],
        "sort": [["a", "desc"], ["b", "asc"]],
        "limit": 2,
        "fields": ["a"]
    }))
    .unwrap();

    let rows = fixture();
    let out = execute(&rows, &query.compile(), "_id").unwrap();

    assert_eq!(
        out.iter().map(|r| Value::Object(r.clone())).collect::<Vec<_>>(),
        vec![json!({"_id": "r2", "a": 9}), json!({"_id": "r4", "a": 9})]
    );
}
