use std::sync::Arc;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Nullable, Text};
use serde_json::{json, Value};
use tempfile::TempDir;

use syncpush_core::sync::{Batch, BatchPersisterTrait, FieldMap, Operation};
use syncpush_core::{DatabaseError, Error, PersisterConfig, ValidationError};
use syncpush_storage_sqlite::SqlitePersister;

const SCHEMA: &str = "
    CREATE TABLE checkpoints (
        user_id TEXT NOT NULL,
        client_id TEXT NOT NULL,
        checkpoint INTEGER NOT NULL,
        PRIMARY KEY (user_id, client_id)
    );
    CREATE TABLE todos (
        id TEXT PRIMARY KEY,
        description TEXT,
        completed BOOLEAN NOT NULL DEFAULT 0
    );
    CREATE TABLE lists (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE items (
        id TEXT PRIMARY KEY,
        list_id TEXT NOT NULL REFERENCES lists(id),
        title TEXT
    );
";

#[derive(QueryableByName, Debug, PartialEq)]
struct TodoRow {
    #[diesel(sql_type = Text)]
    id: String,
    #[diesel(sql_type = Nullable<Text>)]
    description: Option<String>,
    #[diesel(sql_type = Bool)]
    completed: bool,
}

#[derive(QueryableByName)]
struct IdRow {
    #[diesel(sql_type = Text)]
    id: String,
}

fn todo(id: &str, description: Option<&str>, completed: bool) -> TodoRow {
    TodoRow {
        id: id.to_string(),
        description: description.map(str::to_string),
        completed,
    }
}

fn fields(value: Value) -> FieldMap {
    value.as_object().cloned().unwrap_or_default()
}

fn batch(operations: Vec<Operation>) -> Batch {
    Batch::new(operations).expect("non-empty batch")
}

struct Store {
    persister: Arc<SqlitePersister>,
    // Keeps the database file alive for the test.
    _dir: TempDir,
}

impl Store {
    fn open() -> Self {
        Self::open_with(|config| config)
    }

    fn open_with(configure: impl FnOnce(PersisterConfig) -> PersisterConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sync.db");
        let config = configure(PersisterConfig::new(format!("sqlite://{}", path.display())));
        let persister = SqlitePersister::open(&config).expect("open persister");
        persister
            .pool()
            .get()
            .expect("connection")
            .batch_execute(SCHEMA)
            .expect("create schema");
        Self {
            persister: Arc::new(persister),
            _dir: dir,
        }
    }

    fn todos(&self) -> Vec<TodoRow> {
        let mut conn = self.persister.pool().get().expect("connection");
        diesel::sql_query("SELECT id, description, completed FROM todos ORDER BY id")
            .load::<TodoRow>(&mut conn)
            .expect("load todos")
    }

    fn ids(&self, table: &str) -> Vec<String> {
        let mut conn = self.persister.pool().get().expect("connection");
        diesel::sql_query(format!("SELECT id FROM {table} ORDER BY id"))
            .load::<IdRow>(&mut conn)
            .expect("load ids")
            .into_iter()
            .map(|row| row.id)
            .collect()
    }
}

#[tokio::test]
async fn put_then_patch_keeps_untouched_columns() {
    let store = Store::open();

    store
        .persister
        .apply_batch(batch(vec![Operation::put(
            "todos",
            "1",
            fields(json!({ "description": "buy milk", "completed": false })),
        )]))
        .await
        .expect("put");
    store
        .persister
        .apply_batch(batch(vec![Operation::patch(
            "todos",
            "1",
            fields(json!({ "completed": true })),
        )]))
        .await
        .expect("patch");

    assert_eq!(store.todos(), vec![todo("1", Some("buy milk"), true)]);
}

#[tokio::test]
async fn repeated_put_leaves_one_row() {
    let store = Store::open();
    let put = Operation::put(
        "todos",
        "1",
        fields(json!({ "description": "water plants", "completed": true })),
    );

    for _ in 0..3 {
        store
            .persister
            .apply_batch(batch(vec![put.clone()]))
            .await
            .expect("put");
    }

    assert_eq!(store.todos(), vec![todo("1", Some("water plants"), true)]);
}

#[tokio::test]
async fn delete_removes_only_the_addressed_row() {
    let store = Store::open();

    store
        .persister
        .apply_batch(batch(vec![
            Operation::put("todos", "1", fields(json!({ "description": "a" }))),
            Operation::put("todos", "2", fields(json!({ "description": "b" }))),
            Operation::delete("todos", "1"),
            Operation::delete("todos", "missing"),
        ]))
        .await
        .expect("apply");

    assert_eq!(store.todos(), vec![todo("2", Some("b"), false)]);
}

#[tokio::test]
async fn invalid_operation_rejects_the_whole_batch() {
    let store = Store::open();

    let err = store
        .persister
        .apply_batch(batch(vec![
            Operation::put("todos", "1", fields(json!({ "description": "a" }))),
            Operation::put("todos", "2", fields(json!({ "description": "b" }))),
            Operation::patch("todos", "1", fields(json!({ "id": "1" }))),
        ]))
        .await
        .expect_err("patch without columns");

    assert_eq!(err.operation_index(), Some(2));
    assert!(matches!(
        err.root(),
        Error::Validation(ValidationError::NoUpdatableColumns { .. })
    ));
    assert!(store.todos().is_empty());
}

#[tokio::test]
async fn store_error_mid_batch_rolls_back_earlier_operations() {
    let store = Store::open();

    let err = store
        .persister
        .apply_batch(batch(vec![
            Operation::put("todos", "1", fields(json!({ "description": "a" }))),
            Operation::put("no_such_table", "1", fields(json!({ "value": 1 }))),
        ]))
        .await
        .expect_err("unknown table");

    assert_eq!(err.operation_index(), Some(1));
    assert!(err.is_database());
    assert!(store.todos().is_empty());
}

#[tokio::test]
async fn not_null_violation_is_reported_as_constraint_error() {
    let store = Store::open();

    let err = store
        .persister
        .apply_batch(batch(vec![Operation::put(
            "lists",
            "L",
            fields(json!({ "name": null })),
        )]))
        .await
        .expect_err("null name");

    assert!(matches!(
        err.root(),
        Error::Database(DatabaseError::ConstraintViolation(_))
    ));
    assert!(store.ids("lists").is_empty());
}

#[tokio::test]
async fn unknown_kind_is_rejected_before_touching_the_store() {
    let store = Store::open();

    let err = Batch::from_json(json!([
        { "op": "PUT", "type": "todos", "id": "1", "data": { "description": "a" } },
        { "op": "UPSERT", "type": "todos", "id": "2", "data": { "description": "b" } },
    ]))
    .expect_err("unknown kind");

    assert_eq!(err.operation_index(), Some(1));
    assert!(matches!(
        err.root(),
        Error::Validation(ValidationError::UnknownKind(kind)) if kind == "UPSERT"
    ));
    assert!(store.todos().is_empty());
}

#[tokio::test]
async fn wire_payloads_apply_like_constructed_operations() {
    let store = Store::open();

    let upload = Batch::from_json(json!([
        { "op": "put", "type": "todos", "id": "1", "data": { "description": "buy milk" } },
        { "op": "PATCH", "table": "todos", "id": "1", "fields": { "completed": true } },
    ]))
    .expect("decode");
    store.persister.apply_batch(upload).await.expect("apply");

    assert_eq!(store.todos(), vec![todo("1", Some("buy milk"), true)]);
}

#[tokio::test]
async fn values_take_the_column_affinity() {
    let store = Store::open();

    store
        .persister
        .apply_batch(batch(vec![Operation::put(
            "todos",
            "1",
            fields(json!({ "description": 42, "completed": true })),
        )]))
        .await
        .expect("put");

    assert_eq!(store.todos(), vec![todo("1", Some("42"), true)]);
}

#[tokio::test]
async fn foreign_keys_are_checked_at_commit() {
    let store = Store::open();

    store
        .persister
        .apply_batch(batch(vec![
            Operation::put(
                "items",
                "i1",
                fields(json!({ "list_id": "L", "title": "milk" })),
            ),
            Operation::put("lists", "L", fields(json!({ "name": "groceries" }))),
        ]))
        .await
        .expect("child before parent");
    assert_eq!(store.ids("items"), vec!["i1".to_string()]);

    let err = store
        .persister
        .apply_batch(batch(vec![Operation::put(
            "items",
            "i2",
            fields(json!({ "list_id": "nowhere" })),
        )]))
        .await
        .expect_err("dangling reference");
    assert!(err.is_database());
    assert_eq!(store.ids("items"), vec!["i1".to_string()]);
}

#[tokio::test]
async fn abandoned_batch_is_rolled_back() {
    let store = Store::open();

    let operations = (0..20_000)
        .map(|n| Operation::put("todos", n.to_string(), fields(json!({ "description": "bulk" }))))
        .collect();
    let outcome = tokio::time::timeout(
        Duration::from_millis(1),
        store.persister.apply_batch(batch(operations)),
    )
    .await;
    assert!(outcome.is_err(), "deadline should expire before commit");

    // Writes are serial, so this bump runs only after the abandoned batch ended.
    store.persister.bump("u1", "phone").await.expect("bump");
    assert!(store.todos().is_empty());
}

#[tokio::test]
async fn allow_list_limits_writable_tables() {
    let store = Store::open_with(|config| config.with_allowed_tables(["todos"]));

    let err = store
        .persister
        .apply_batch(batch(vec![
            Operation::put("todos", "1", fields(json!({ "description": "a" }))),
            Operation::put("lists", "L", fields(json!({ "name": "x" }))),
        ]))
        .await
        .expect_err("lists not allowed");

    assert!(matches!(
        err.root(),
        Error::Validation(ValidationError::TableNotAllowed(table)) if table == "lists"
    ));
    assert!(store.todos().is_empty());
}

#[tokio::test]
async fn checkpoint_counts_up_from_one() {
    let store = Store::open();

    assert_eq!(
        store
            .persister
            .current_checkpoint("u1", "phone")
            .await
            .expect("read"),
        None
    );
    for expected in 1..=5 {
        assert_eq!(
            store.persister.bump("u1", "phone").await.expect("bump"),
            expected
        );
    }
    assert_eq!(
        store
            .persister
            .current_checkpoint("u1", "phone")
            .await
            .expect("read"),
        Some(5)
    );
}

#[tokio::test]
async fn checkpoints_are_independent_per_key() {
    let store = Store::open();

    assert_eq!(store.persister.bump("u1", "phone").await.expect("bump"), 1);
    assert_eq!(store.persister.bump("u1", "phone").await.expect("bump"), 2);
    assert_eq!(store.persister.bump("u1", "laptop").await.expect("bump"), 1);
    assert_eq!(store.persister.bump("u2", "phone").await.expect("bump"), 1);
}

#[tokio::test]
async fn checkpoint_key_parts_are_required() {
    let store = Store::open();

    let err = store.persister.bump("", "phone").await.expect_err("no user");
    assert!(err.is_validation());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bumps_return_every_value_once() {
    let store = Store::open();

    let handles = (0..20)
        .map(|_| {
            let persister = store.persister.clone();
            tokio::spawn(async move { persister.bump("u1", "tablet").await })
        })
        .collect::<Vec<_>>();

    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.expect("join").expect("bump"));
    }
    values.sort_unstable();
    assert_eq!(values, (1..=20).collect::<Vec<i64>>());
}
