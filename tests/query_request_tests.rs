use flatrest_engine::engine::{Operation, QueryRequest};
use flatrest_engine::storage::JsonStore;
use flatrest_engine::utils::{
    error::{FlatrestError, QueryError},
    types::{QueryResult, ResultData, Row},
};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Helper function to create a store seeded with a small vendor table
fn create_seeded_store() -> (TempDir, JsonStore) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = JsonStore::new(temp_dir.path()).expect("Failed to open store");

    let request = QueryRequest::from_json(
        &json!({
            "operation": "insert",
            "body": [
                {"id": "v1", "name": "Acme Ltd", "email": "ops@acme.io", "status": "pending", "score": 4},
                {"id": "v2", "name": "Globex", "email": "hi@globex.com", "status": "approved", "score": 9},
                {"id": "v3", "name": "Initech", "email": "acme@initech.com", "status": "pending", "score": 7},
                {"id": "v4", "name": "Umbrella", "email": null, "status": "rejected", "score": 1}
            ]
        })
        .to_string(),
    )
    .expect("valid request");
    request.execute(&store, "vendors").expect("seed insert");

    (temp_dir, store)
}

fn run(store: &JsonStore, payload: Value) -> Result<QueryResult, FlatrestError> {
    QueryRequest::from_json(&payload.to_string())?.execute(store, "vendors")
}

fn ids(rows: &[Row]) -> Vec<&str> {
    rows.iter().filter_map(|r| r.get("id").and_then(Value::as_str)).collect()
}

#[test]
fn test_missing_operation_is_configuration_error() {
    let (_dir, store) = create_seeded_store();

    match run(&store, json!({"columns": "*"})) {
        Err(FlatrestError::Configuration(message)) => assert!(message.contains("No operation")),
        other => panic!("Expected Configuration error, got {:?}", other),
    }
}

#[test]
fn test_unknown_operation_is_configuration_error() {
    let (_dir, store) = create_seeded_store();
    assert!(matches!(
        run(&store, json!({"operation": "truncate"})),
        Err(FlatrestError::Configuration(_))
    ));
}

#[test]
fn test_select_with_filters_order_and_limit() {
    let (_dir, store) = create_seeded_store();

    let result = run(
        &store,
        json!({
            "operation": "select",
            "columns": "id, score",
            "filters": [
                {"type": "eq", "column": "status", "value": "pending"},
                {"type": "gte", "column": "score", "value": 4}
            ],
            "order_by": "score",
            "order_desc": true,
            "limit": 5
        }),
    )
    .expect("select succeeds");

    assert_eq!(
        result.to_json(),
        json!({"data": [{"id": "v3", "score": 7}, {"id": "v1", "score": 4}], "count": null})
    );
}

#[test]
fn test_or_group_filter() {
    let (_dir, store) = create_seeded_store();

    let rows = run(
        &store,
        json!({
            "operation": "select",
            "filters": [{"type": "or", "value": "name.ilike.%acme%,email.ilike.%acme%"}]
        }),
    )
    .expect("select succeeds")
    .into_rows();

    assert_eq!(ids(&rows), vec!["v1", "v3"]);
}

#[test]
fn test_range_count_and_extra_order_keys() {
    let (_dir, store) = create_seeded_store();

    let result = run(
        &store,
        json!({
            "operation": "select",
            "columns": "id",
            "order": [{"column": "status"}, {"column": "score", "desc": true}],
            "range": [1, 2],
            "count": "exact"
        }),
    )
    .expect("select succeeds");

    assert_eq!(result.count, Some(4));
    assert_eq!(ids(&result.into_rows()), vec!["v3", "v1"]);
}

#[test]
fn test_head_request_returns_null_data() {
    let (_dir, store) = create_seeded_store();

    let result = run(
        &store,
        json!({"operation": "select", "count": "planned", "head": true,
               "filters": [{"type": "is", "column": "email", "value": null}]}),
    )
    .expect("select succeeds");

    assert_eq!(result.to_json(), json!({"data": null, "count": 1}));
}

#[test]
fn test_single_request_errors_on_many_rows() {
    let (_dir, store) = create_seeded_store();

    let result = run(
        &store,
        json!({"operation": "select", "single": true, "filters": [{"column": "status", "value": "pending"}]}),
    );
    assert!(matches!(
        result,
        Err(FlatrestError::Query(QueryError::RowCount { found: 2, .. }))
    ));
}

#[test]
fn test_update_request_with_maybe_single() {
    let (_dir, store) = create_seeded_store();

    let result = run(
        &store,
        json!({
            "operation": "update",
            "body": {"status": "approved"},
            "filters": [{"type": "in", "column": "id", "value": ["v1", "v3"]}],
            "maybe_single": true
        }),
    )
    .expect("update succeeds");

    match result.data {
        ResultData::Row(row) => {
            assert_eq!(row.get("id"), Some(&json!("v1")));
            assert_eq!(row.get("status"), Some(&json!("approved")));
        }
        other => panic!("Expected a single row, got {:?}", other),
    }

    let approved = run(&store, json!({"operation": "select", "filters": [{"column": "status", "value": "approved"}]}))
        .expect("select succeeds")
        .into_rows();
    assert_eq!(ids(&approved), vec!["v1", "v2", "v3"]);
}

#[test]
fn test_upsert_and_delete_requests() {
    let (_dir, store) = create_seeded_store();

    let upserted = run(
        &store,
        json!({"operation": "upsert", "body": [{"id": "v4", "score": 2}, {"id": "v5", "name": "Hooli"}]}),
    )
    .expect("upsert succeeds")
    .into_rows();
    assert_eq!(ids(&upserted), vec!["v4", "v5"]);
    assert_eq!(upserted[0].get("name"), Some(&json!("Umbrella")));

    let deleted = run(
        &store,
        json!({"operation": "delete", "filters": [{"type": "lt", "column": "score", "value": 3}]}),
    )
    .expect("delete succeeds")
    .into_rows();
    assert_eq!(ids(&deleted), vec!["v4"]);

    let remaining = run(&store, json!({"operation": "select", "columns": "id"})).expect("select").into_rows();
    assert_eq!(ids(&remaining), vec!["v1", "v2", "v3", "v5"]);
}

#[test]
fn test_unknown_filter_type_is_ignored() {
    let (_dir, store) = create_seeded_store();

    let rows = run(
        &store,
        json!({"operation": "select", "filters": [{"type": "like", "column": "name", "value": "A%"}]}),
    )
    .expect("select succeeds")
    .into_rows();
    assert_eq!(rows.len(), 4);
}

#[test]
fn test_insert_request_without_body_fails() {
    let (_dir, store) = create_seeded_store();
    assert!(matches!(
        run(&store, json!({"operation": "insert"})),
        Err(FlatrestError::Configuration(_))
    ));
}

#[test]
fn test_programmatic_request_matches_builder() {
    let (_dir, store) = create_seeded_store();

    let mut request = QueryRequest::new(Operation::Select);
    request.columns = "id".to_string();
    request.order_by = Some("score".to_string());
    request.limit = Some(2);

    let query = request.build(&store, "vendors").expect("builds");
    assert_eq!(query.operation(), Operation::Select);
    assert_eq!(ids(&query.execute().expect("select").into_rows()), vec!["v4", "v1"]);
}
