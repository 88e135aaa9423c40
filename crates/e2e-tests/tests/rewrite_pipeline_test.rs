//! Read-path E2E tests: records created through the middleware are indexed,
//! and `fts:` markers in read filters are rewritten into id predicates the
//! record store can evaluate.

use pretty_assertions::assert_eq;
use serde_json::json;

use e2e_tests::TestHarness;
use fts_core::Action;
use fts_types::FtsError;

async fn seeded() -> TestHarness {
    let harness = TestHarness::new();
    harness
        .create_post(1, "Rust ownership explained", "borrowing and lifetimes")
        .await;
    harness
        .create_post(2, "Async Rust in practice", "futures executors and lifetimes")
        .await;
    harness
        .create_post(3, "Gardening notes", "tomatoes and futures markets")
        .await;
    harness
}

#[tokio::test]
async fn test_single_marker_finds_matching_records() {
    let harness = seeded().await;

    assert_eq!(harness.find_ids(json!({ "title": "fts:rust" })).await, vec![1, 2]);
    assert_eq!(harness.find_ids(json!({ "content": "fts:tomatoes" })).await, vec![3]);
}

#[tokio::test]
async fn test_markers_on_same_object_intersect() {
    let harness = seeded().await;

    let ids = harness
        .find_ids(json!({ "title": "fts:rust", "content": "fts:futures" }))
        .await;
    assert_eq!(ids, vec![2]);
}

#[tokio::test]
async fn test_markers_under_and_combine_through_the_store() {
    let harness = seeded().await;

    let ids = harness
        .find_ids(json!({ "AND": [{ "content": "fts:lifetimes" }, { "content": "fts:futures" }] }))
        .await;
    assert_eq!(ids, vec![2]);
}

#[tokio::test]
async fn test_or_branches_stay_independent() {
    let harness = seeded().await;

    let ids = harness
        .find_ids(json!({ "OR": [{ "title": "fts:gardening" }, { "content": "fts:borrowing" }] }))
        .await;
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn test_plain_predicates_pass_through() {
    let harness = seeded().await;

    let ids = harness
        .find_ids(json!({ "content": "fts:futures", "NOT": { "id": 3 } }))
        .await;
    assert_eq!(ids, vec![2]);

    let ids = harness
        .find_ids(json!({ "title": { "contains": "Rust" } }))
        .await;
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_caller_membership_narrows_search_hits() {
    let harness = seeded().await;

    // futures matches 2 and 3; the caller only allows 1 and 3
    let ids = harness
        .find_ids(json!({ "id": { "in": [1, 3] }, "content": "fts:futures" }))
        .await;
    assert_eq!(ids, vec![3]);
}

#[tokio::test]
async fn test_marker_options_reach_provider() {
    let harness = seeded().await;

    let ids = harness
        .find_ids(json!({ "content": r#"fts:futures lifetimes{"conjunction":true}"# }))
        .await;
    assert_eq!(ids, vec![2]);

    let ids = harness
        .find_ids(json!({ "title": r#"fts:rust{"limit":1}"# }))
        .await;
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_no_hits_yields_empty_membership() {
    let harness = seeded().await;

    assert_eq!(harness.find_ids(json!({ "title": "fts:kubernetes" })).await, Vec::<i64>::new());
}

#[tokio::test]
async fn test_count_is_rewritten() {
    let harness = seeded().await;

    let count = harness
        .call(Action::Count, json!({ "where": { "title": "fts:rust" } }))
        .await
        .unwrap();
    assert_eq!(count, json!(2));
}

#[tokio::test]
async fn test_malformed_options_fail_the_query() {
    let harness = seeded().await;

    let err = harness
        .call(Action::FindMany, json!({ "where": { "title": "fts:rust{oops}" } }))
        .await
        .unwrap_err();
    assert!(matches!(err, FtsError::InvalidSearchOptions { .. }));
}

#[tokio::test]
async fn test_unknown_column_in_marker_is_left_alone() {
    let harness = seeded().await;

    // `summary` is not bound, so the marker reaches the store verbatim.
    let ids = harness.find_ids(json!({ "summary": "fts:rust" })).await;
    assert_eq!(ids, Vec::<i64>::new());
}
