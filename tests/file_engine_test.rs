//! File engine against a real directory

use diary::storage::testing::{TEST_ID, TEST_NOW};
use diary::storage::{
    FileStorageEngine, Item, Scalar, StorageClient, StorageEngine, StorageError, TableSpec,
    TableStatus,
};
use serde_json::Value;
use std::sync::Arc;

fn client(engine: FileStorageEngine) -> StorageClient {
    StorageClient::builder(Arc::new(engine))
        .id_source(Arc::new(|| TEST_ID.to_string()))
        .clock(Arc::new(|| TEST_NOW.to_string()))
        .build()
}

fn item(fields: &[(&str, &str)]) -> Item {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), Scalar::from(*v)))
        .collect()
}

fn read_document(path: std::path::PathBuf) -> Value {
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e));
    serde_json::from_str(&text).expect("valid JSON document")
}

#[tokio::test]
async fn test_layout_under_filedb() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FileStorageEngine::new(dir.path(), "journal");
    let db_root = engine.db_root().to_path_buf();
    assert_eq!(db_root, dir.path().join(".filedb").join("journal"));

    let client = client(engine);
    client
        .add_item(
            item(&[("userId", "u1"), ("date", "2020-01-01"), ("notes", "x")]),
            &TableSpec::new("entries", vec!["userId"]).with_sort_key(vec!["date"]),
        )
        .await
        .unwrap();

    let tables = read_document(db_root.join("tables.json"));
    assert_eq!(tables["entries"]["hashKey"], "userId");
    assert_eq!(tables["entries"]["sortKey"], "date");

    let items = read_document(db_root.join("entries.json"));
    let stored = &items["u1+2020-01-01"];
    assert_eq!(stored["notes"], "x");
    assert_eq!(stored["id"], TEST_ID);
    assert_eq!(stored["createdDate"], TEST_NOW);
}

#[tokio::test]
async fn test_composite_hash_key_without_sort_key() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FileStorageEngine::new(dir.path(), "default");
    let db_root = engine.db_root().to_path_buf();
    let client = client(engine);

    let stored = client
        .add_item(
            item(&[("a", "x"), ("b", "y")]),
            &TableSpec::new("pairs", vec!["a", "b"]),
        )
        .await
        .unwrap();
    assert_eq!(stored["a|b"], Scalar::from("x|y"));

    let items = read_document(db_root.join("pairs.json"));
    let keys: Vec<_> = items.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["x|y".to_string()]);

    let found = client
        .get_items("a|b", &Scalar::from("x|y"), "pairs")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_composite_hash_key_with_sort_key() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FileStorageEngine::new(dir.path(), "default");
    let db_root = engine.db_root().to_path_buf();
    let client = client(engine);

    let spec = TableSpec::new("pairs", vec!["a", "b"]).with_sort_key(vec!["c"]);
    client
        .add_item(item(&[("a", "x"), ("b", "y"), ("c", "1")]), &spec)
        .await
        .unwrap();
    client
        .add_item(item(&[("a", "x"), ("b", "y"), ("c", "2")]), &spec)
        .await
        .unwrap();
    client
        .add_item(item(&[("a", "x"), ("b", "z"), ("c", "1")]), &spec)
        .await
        .unwrap();

    let items = read_document(db_root.join("pairs.json"));
    let keys: Vec<_> = items.as_object().unwrap().keys().cloned().collect();
    assert!(keys.contains(&"x|y+1".to_string()));
    assert!(keys.contains(&"x|y+2".to_string()));
    assert!(keys.contains(&"x|z+1".to_string()));

    let found = client
        .get_items("a|b", &Scalar::from("x|y"), "pairs")
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_missing_location() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("does-not-exist");
    let engine = FileStorageEngine::new(&location, "default");

    let err = engine.create_table("userId", None, "entries").await.unwrap_err();
    assert!(matches!(err, StorageError::MissingLocation { .. }));

    let err = engine
        .add_item(item(&[("userId", "u1")]), "entries")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::MissingLocation { .. }));

    let err = engine
        .get_items("userId", &Scalar::from("u1"), "entries")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::MissingLocation { .. }));

    let err = engine.describe_table("entries").await.unwrap_err();
    assert!(matches!(err, StorageError::MissingLocation { .. }));
}

#[tokio::test]
async fn test_table_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FileStorageEngine::new(dir.path(), "default");

    engine.create_table("userId", Some("date"), "entries").await.unwrap();
    let description = engine.describe_table("entries").await.unwrap();
    assert_eq!(description.hash_key, "userId");
    assert_eq!(description.sort_key.as_deref(), Some("date"));
    assert_eq!(description.status, TableStatus::Active);

    let err = engine.create_table("userId", None, "entries").await.unwrap_err();
    assert!(matches!(err, StorageError::ExistingTable { .. }));

    let err = engine.describe_table("other").await.unwrap_err();
    assert!(err.is_missing_table());

    engine.wait_for_table("entries").await.unwrap();
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let spec = TableSpec::new("entries", vec!["userId"]).with_sort_key(vec!["date"]);

    client(FileStorageEngine::new(dir.path(), "default"))
        .add_item(item(&[("userId", "u1"), ("date", "2020-01-01")]), &spec)
        .await
        .unwrap();

    let reopened = client(FileStorageEngine::new(dir.path(), "default"));
    let found = reopened
        .get_items("userId", &Scalar::from("u1"), "entries")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["date"], Scalar::from("2020-01-01"));
}

#[tokio::test]
async fn test_unreadable_document_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FileStorageEngine::new(dir.path(), "default");
    engine.create_table("userId", None, "entries").await.unwrap();
    std::fs::write(engine.db_root().join("entries.json"), "not json").unwrap();

    let found = engine
        .get_items("userId", &Scalar::from("u1"), "entries")
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_hash_values_containing_separator_stay_apart() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(FileStorageEngine::new(dir.path(), "default"));
    let spec = TableSpec::new("entries", vec!["userId"]).with_sort_key(vec!["date"]);

    client
        .add_item(item(&[("userId", "bob"), ("date", "2020-01-01")]), &spec)
        .await
        .unwrap();
    client
        .add_item(item(&[("userId", "bob+work"), ("date", "2020-01-01")]), &spec)
        .await
        .unwrap();

    let found = client
        .get_items("userId", &Scalar::from("bob"), "entries")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["userId"], Scalar::from("bob"));

    let found = client
        .get_items("userId", &Scalar::from("bob+work"), "entries")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["userId"], Scalar::from("bob+work"));
}

#[tokio::test]
async fn test_number_and_string_hash_values_differ() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FileStorageEngine::new(dir.path(), "default");
    engine.create_table("n", Some("s"), "numbers").await.unwrap();

    let mut number = Item::new();
    number.insert("n".to_string(), Scalar::from(3));
    number.insert("s".to_string(), Scalar::from("a"));
    engine.add_item(number, "numbers").await.unwrap();

    let mut string = Item::new();
    string.insert("n".to_string(), Scalar::from("3"));
    string.insert("s".to_string(), Scalar::from("b"));
    engine.add_item(string, "numbers").await.unwrap();

    let found = engine
        .get_items("n", &Scalar::Number(3.0), "numbers")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["s"], Scalar::from("a"));

    let found = engine
        .get_items("n", &Scalar::from("3"), "numbers")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["s"], Scalar::from("b"));
}
