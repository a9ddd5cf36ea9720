use flatrest_engine::engine::Filterable;
use flatrest_engine::storage::JsonStore;
use flatrest_engine::utils::{
    config::{RelationConfig, StoreConfig},
    types::Row,
};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

/// Store with the relations a request-tracking app would declare
fn create_store() -> (TempDir, JsonStore) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = StoreConfig::new(temp_dir.path())
        .with_relation("quotes", "vendor_requests", RelationConfig::new("request_id"))
        .with_relation("quotes", "owner", RelationConfig::new("owner_id").with_table("users"))
        .with_relation("users", "manager", RelationConfig::new("manager_id").with_table("users"));
    let store = JsonStore::open(config).expect("Failed to open store");
    (temp_dir, store)
}

fn row(value: Value) -> Row {
    value.as_object().cloned().expect("row must be an object")
}

fn seed(store: &JsonStore) {
    store
        .table("vendor_requests")
        .insert(vec![
            row(json!({"id": "r1", "vendor_name": "Acme", "vendor_email": "ops@acme.io", "status": "open"})),
            row(json!({"id": "r2", "vendor_name": "Globex", "vendor_email": "hi@globex.com", "status": "closed"})),
        ])
        .execute()
        .expect("seed requests");

    store
        .table("users")
        .insert(vec![
            row(json!({"id": "u1", "name": "Dana", "manager_id": null})),
            row(json!({"id": "u2", "name": "Noa", "manager_id": "u1"})),
            row(json!({"id": "u3", "name": "Avi", "manager_id": "u9"})),
        ])
        .execute()
        .expect("seed users");

    store
        .table("quotes")
        .insert(vec![
            row(json!({"id": "q1", "amount": 100, "request_id": "r1", "owner_id": "u2"})),
            row(json!({"id": "q2", "amount": 250, "request_id": "r2", "owner_id": "u1"})),
            row(json!({"id": "q3", "amount": 75, "request_id": null})),
            row(json!({"id": "q4", "amount": 40, "request_id": "r404", "owner_id": "u1"})),
        ])
        .execute()
        .expect("seed quotes");
}

fn quote(store: &JsonStore, columns: &str, id: &str) -> Row {
    let result = store
        .table("quotes")
        .select(columns)
        .eq("id", id)
        .single()
        .execute()
        .expect("select succeeds");
    result.single_row().cloned().expect("one quote")
}

#[test]
fn test_embed_mapped_relation_with_selected_columns() {
    let (_dir, store) = create_store();
    seed(&store);

    let q1 = quote(&store, "id, amount, vendor_requests(vendor_name, vendor_email)", "q1");
    assert_eq!(
        Value::Object(q1),
        json!({
            "id": "q1",
            "amount": 100,
            "vendor_requests": {"vendor_name": "Acme", "vendor_email": "ops@acme.io"}
        })
    );
}

#[test]
fn test_embed_alongside_star_keeps_every_field() {
    let (_dir, store) = create_store();
    seed(&store);

    let q2 = quote(&store, "*, vendor_requests(status)", "q2");
    assert_eq!(q2.get("request_id"), Some(&json!("r2")));
    assert_eq!(q2.get("owner_id"), Some(&json!("u1")));
    assert_eq!(q2.get("vendor_requests"), Some(&json!({"status": "closed"})));
}

#[test]
fn test_embed_relation_with_explicit_target_table() {
    let (_dir, store) = create_store();
    seed(&store);

    let q1 = quote(&store, "id, owner(name)", "q1");
    assert_eq!(q1.get("owner"), Some(&json!({"name": "Noa"})));

    let q1 = quote(&store, "id, owner(*)", "q1");
    let owner = q1["owner"].as_object().expect("owner embedded");
    assert_eq!(owner.len(), 5);
    assert_eq!(owner["id"], json!("u2"));
    assert_eq!(owner["manager_id"], json!("u1"));
}

#[test]
fn test_null_or_absent_foreign_key_embeds_null() {
    let (_dir, store) = create_store();
    seed(&store);

    let q3 = quote(&store, "id, vendor_requests(vendor_name), owner(name)", "q3");
    assert_eq!(q3.get("vendor_requests"), Some(&Value::Null));
    assert_eq!(q3.get("owner"), Some(&Value::Null));
}

#[test]
fn test_dangling_foreign_key_embeds_null() {
    let (_dir, store) = create_store();
    seed(&store);

    let q4 = quote(&store, "id, vendor_requests(vendor_name), owner(name)", "q4");
    assert_eq!(q4.get("vendor_requests"), Some(&Value::Null));
    assert_eq!(q4.get("owner"), Some(&json!({"name": "Dana"})));
}

#[test]
fn test_unmapped_relation_embeds_null() {
    let (_dir, store) = create_store();
    seed(&store);

    let q1 = quote(&store, "id, approvals(state)", "q1");
    assert_eq!(Value::Object(q1), json!({"id": "q1", "approvals": null}));
}

#[test]
fn test_related_table_missing_on_disk_embeds_null() {
    let (dir, store) = create_store();
    seed(&store);
    fs::remove_file(dir.path().join("vendor_requests.json")).expect("remove related table");

    let q1 = quote(&store, "id, vendor_requests(vendor_name)", "q1");
    assert_eq!(q1.get("vendor_requests"), Some(&Value::Null));
}

#[test]
fn test_self_relation_resolves_within_the_same_table() {
    let (_dir, store) = create_store();
    seed(&store);

    let users = store
        .table("users")
        .select("name, manager(name)")
        .execute()
        .expect("select succeeds")
        .into_rows();

    assert_eq!(
        users.into_iter().map(Value::Object).collect::<Vec<_>>(),
        vec![
            json!({"name": "Dana", "manager": null}),
            json!({"name": "Noa", "manager": {"name": "Dana"}}),
            json!({"name": "Avi", "manager": null}),
        ]
    );
}

#[test]
fn test_embedding_applies_after_filters_and_ordering() {
    let (_dir, store) = create_store();
    seed(&store);

    let quotes = store
        .table("quotes")
        .select("id, vendor_requests(vendor_name)")
        .gte("amount", 100)
        .execute()
        .expect("select succeeds")
        .into_rows();

    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes[0]["vendor_requests"], json!({"vendor_name": "Acme"}));
    assert_eq!(quotes[1]["vendor_requests"], json!({"vendor_name": "Globex"}));
}

#[test]
fn test_relations_load_from_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("flatrest.json");
    let data_dir = temp_dir.path().join("data");
    fs::write(
        &config_path,
        json!({
            "data_dir": data_dir,
            "relations": {"quotes": {"vendor_requests": {"foreign_key": "request_id"}}}
        })
        .to_string(),
    )
    .expect("write config");

    let config = StoreConfig::from_file(&config_path).expect("config parses");
    let store = JsonStore::open(config).expect("Failed to open store");
    store
        .table("vendor_requests")
        .insert_one(row(json!({"id": "r1", "vendor_name": "Acme"})))
        .execute()
        .expect("insert");
    store
        .table("quotes")
        .insert_one(row(json!({"id": "q1", "request_id": "r1"})))
        .execute()
        .expect("insert");

    let q1 = quote(&store, "id, vendor_requests(vendor_name)", "q1");
    assert_eq!(q1.get("vendor_requests"), Some(&json!({"vendor_name": "Acme"})));
}
