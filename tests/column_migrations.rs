use tabledb::{Database, ErrorKind, StoreConfig, Target, Value, definition, document};
use tempfile::tempdir;

async fn seeded(db: &Database) -> tabledb::Table {
    let mut table = db
        .table("items", Some(definition([("foo", "String")])))
        .expect("table");
    table
        .insert([document([("foo", "a")]), document([("foo", "b")])])
        .expect("insert");
    table.save().await.expect("seed");
    table
}

#[tokio::test]
async fn add_column_fills_default_and_persists_schema() {
    let dir = tempdir().expect("temp dir");
    let db = Database::open(StoreConfig::new(dir.path()), "app").expect("open");
    let mut table = seeded(&db).await;

    let err = table
        .add_column("bar", "String", None)
        .await
        .expect_err("default is mandatory");
    assert_eq!(err.kind(), ErrorKind::Usage);

    table
        .add_column("bar", "String", Some("x".into()))
        .await
        .expect("add");
    let rows = table.query(Target::All).await.expect("query");
    assert!(rows.iter().all(|r| r.get("bar") == Some(&Value::from("x"))));
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);

    let reopened = Database::open(StoreConfig::new(dir.path()), "app").expect("reopen");
    let table = reopened.table("items", None).expect("table");
    assert_eq!(
        table.config().schema,
        definition([("foo", "String"), ("bar", "String")])
    );
    assert_eq!(table.config().last_id, 2);
}

#[tokio::test]
async fn update_column_changes_type_and_optionally_overwrites() {
    let db = Database::open(StoreConfig::in_memory(), "app").expect("open");
    let mut table = seeded(&db).await;

    table
        .update_column("foo", "Any", None)
        .await
        .expect("retype");
    let rows = table.query(Target::All).await.expect("query");
    assert_eq!(rows[0].get("foo"), Some(&Value::from("a")));

    table
        .update_column("foo", "Integer", Some(0_i64.into()))
        .await
        .expect("retype with default");
    let rows = table.query(Target::All).await.expect("query");
    assert!(rows.iter().all(|r| r.get("foo") == Some(&Value::Integer(0))));

    let err = table
        .update_column("missing", "Any", None)
        .await
        .expect_err("unknown column");
    assert_eq!(err.code_str(), "column_not_found");
}

#[tokio::test]
async fn drop_and_rename_columns() {
    let db = Database::open(StoreConfig::in_memory(), "app").expect("open");
    let mut table = seeded(&db).await;
    table
        .add_column("tmp", "Boolean", Some(true.into()))
        .await
        .expect("add");

    table.rename_column("foo", "baz").await.expect("rename");
    let rows = table.query(Target::id(1)).await.expect("query");
    assert_eq!(rows[0].get("baz"), Some(&Value::from("a")));
    assert!(rows[0].get("foo").is_none());

    table.drop_columns(["tmp", "ghost"]).await.expect("drop");
    assert_eq!(table.config().schema, definition([("baz", "String")]));
    let rows = table.query(Target::All).await.expect("query");
    assert!(rows.iter().all(|r| r.get("tmp").is_none()));

    let err = table
        .rename_column("baz", "baz")
        .await
        .expect_err("same name");
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[tokio::test]
async fn migration_leaves_pending_queue_and_save_revalidates() {
    let db = Database::open(StoreConfig::in_memory(), "app").expect("open");
    let mut table = seeded(&db).await;

    table
        .update(|row| row.with("foo", "changed"), Target::id(1))
        .insert([document([("foo", "c")])])
        .expect("insert");
    assert_eq!(table.pending(), 2);

    table
        .add_column("n", "Integer", Some(7_i64.into()))
        .await
        .expect("add");
    assert_eq!(table.pending(), 2);
    assert!(table.schema().column("n").is_some());

    // The queued insert predates the new required column.
    let err = table.save().await.expect_err("revalidated");
    assert_eq!(err.code_str(), "missing_column");
    assert_eq!(table.pending(), 2);

    table.revert();
    table
        .insert([document([("foo", Value::from("c")), ("n", Value::from(1_i64))])])
        .expect("insert");
    let summary = table.save().await.expect("save");
    assert_eq!(summary.last_id, 3);
}

#[tokio::test]
async fn second_handle_picks_up_migrated_schema_on_save() {
    let db = Database::open(StoreConfig::in_memory(), "app").expect("open");
    let mut first = seeded(&db).await;
    let mut second = db.table("items", None).expect("second handle");

    first.rename_column("foo", "label").await.expect("rename");

    second.update(|row| row.with("label", "renamed"), Target::id(2));
    let summary = second.save().await.expect("save with fresh schema");
    assert_eq!(summary.rows[1].get("label"), Some(&Value::from("renamed")));
    assert!(second.schema().column("label").is_some());
}

#[tokio::test]
async fn failed_catalog_write_puts_previous_rows_back() {
    let dir = tempdir().expect("temp dir");
    let db = Database::open(StoreConfig::new(dir.path()), "app").expect("open");
    let mut table = seeded(&db).await;

    let rows_path = dir.path().join("app").join("tables").join("items.json");
    let catalog_path = dir.path().join("app").join("catalog.json");
    let before = std::fs::read(&rows_path).expect("read rows");

    // A directory in place of the catalog file makes the rename fail.
    std::fs::remove_file(&catalog_path).expect("remove catalog");
    std::fs::create_dir(&catalog_path).expect("block catalog");

    let err = table
        .add_column("bar", "String", Some("x".into()))
        .await
        .expect_err("catalog write fails");
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(std::fs::read(&rows_path).expect("read rows"), before);
    assert_eq!(table.config().schema, definition([("foo", "String")]));
    assert!(table.schema().column("bar").is_none());
    let stored = db.catalog().read_table("items").expect("catalog entry");
    assert_eq!(stored.schema, definition([("foo", "String")]));

    std::fs::remove_dir(&catalog_path).expect("unblock catalog");
    table.update(|row| row.with("foo", "c"), Target::All);
    let summary = table.save().await.expect("save after restore");
    assert!(summary.rows.iter().all(|r| r.get("bar").is_none()));
}
