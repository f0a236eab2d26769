//! Integration tests for query result caching through the builders.

use dbcore::{CacheOptions, ConnectionManager, Database, Settings, SqlValue};
use std::sync::Arc;
use std::time::Duration;

/// A facade with a memory cache installed and a seeded table.
async fn setup_cached_db() -> Database {
    let settings = Settings::from_json_str(
        r#"{
            "main": { "driver": "sqlite", "database": ":memory:" }
        }"#,
    )
    .unwrap();
    let manager = Arc::new(ConnectionManager::with_settings(settings));
    manager
        .configure_cache(CacheOptions::Memory, Some(Duration::from_secs(60)))
        .unwrap();
    let db = Database::new(manager);

    db.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[])
        .await
        .unwrap();
    db.execute_raw(
        "INSERT INTO users (name) VALUES (?), (?)",
        &[SqlValue::from("ada"), SqlValue::from("grace")],
    )
    .await
    .unwrap();
    db
}

// =========================================================================
// Cache consultation on select
// =========================================================================

#[tokio::test]
async fn test_repeated_select_is_served_from_cache() {
    let db = setup_cached_db().await;

    let first = db.select("users").unwrap().fetch_all().await.unwrap();
    assert_eq!(first.row_count(), 2);

    // Raw writes do not invalidate, so a cached select stays stale
    db.execute_raw("INSERT INTO users (name) VALUES ('alan')", &[])
        .await
        .unwrap();

    let second = db.select("users").unwrap().fetch_all().await.unwrap();
    assert_eq!(second.row_count(), 2, "expected the cached result");
}

#[tokio::test]
async fn test_no_cache_bypasses_the_store() {
    let db = setup_cached_db().await;

    db.select("users").unwrap().fetch_all().await.unwrap();
    db.execute_raw("INSERT INTO users (name) VALUES ('alan')", &[])
        .await
        .unwrap();

    let fresh = db
        .select("users")
        .unwrap()
        .no_cache()
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(fresh.row_count(), 3);
}

#[tokio::test]
async fn test_distinct_queries_get_distinct_entries() {
    let db = setup_cached_db().await;

    let ada = db
        .select("users")
        .unwrap()
        .where_eq("name", "ada")
        .fetch_all()
        .await
        .unwrap();
    let grace = db
        .select("users")
        .unwrap()
        .where_eq("name", "grace")
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(ada.rows[0]["name"], serde_json::json!("ada"));
    assert_eq!(grace.rows[0]["name"], serde_json::json!("grace"));
}

// =========================================================================
// Invalidation on writes
// =========================================================================

#[tokio::test]
async fn test_insert_invalidates_cached_selects() {
    let db = setup_cached_db().await;

    db.select("users").unwrap().fetch_all().await.unwrap();
    db.insert("users")
        .unwrap()
        .value("name", "alan")
        .execute()
        .await
        .unwrap();

    let after = db.select("users").unwrap().fetch_all().await.unwrap();
    assert_eq!(after.row_count(), 3);
}

#[tokio::test]
async fn test_update_invalidates_cached_selects() {
    let db = setup_cached_db().await;

    db.select("users").unwrap().fetch_all().await.unwrap();
    db.update("users")
        .unwrap()
        .set("name", "ada lovelace")
        .where_eq("name", "ada")
        .execute()
        .await
        .unwrap();

    let after = db.select("users").unwrap().fetch_all().await.unwrap();
    let names: Vec<_> = after.rows.iter().map(|r| r["name"].clone()).collect();
    assert!(names.contains(&serde_json::json!("ada lovelace")));
}

#[tokio::test]
async fn test_delete_invalidates_cached_selects() {
    let db = setup_cached_db().await;

    db.select("users").unwrap().fetch_all().await.unwrap();
    db.delete("users")
        .unwrap()
        .where_eq("name", "ada")
        .execute()
        .await
        .unwrap();

    let after = db.select("users").unwrap().fetch_all().await.unwrap();
    assert_eq!(after.row_count(), 1);
}

#[tokio::test]
async fn test_write_to_one_table_keeps_other_tables_cached() {
    let db = setup_cached_db().await;
    db.execute_raw("CREATE TABLE orders (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();

    db.select("users").unwrap().fetch_all().await.unwrap();

    // A write to orders must not evict the users entry
    db.insert("orders").unwrap().value("id", 1).execute().await.unwrap();
    db.execute_raw("INSERT INTO users (name) VALUES ('alan')", &[])
        .await
        .unwrap();

    let users = db.select("users").unwrap().fetch_all().await.unwrap();
    assert_eq!(users.row_count(), 2, "expected the cached users result");
}

// =========================================================================
// Transactions and the cache
// =========================================================================

#[tokio::test]
async fn test_rolled_back_rows_never_reach_the_cache() {
    let db = setup_cached_db().await;

    db.begin_transaction().await.unwrap();
    db.insert("users")
        .unwrap()
        .value("name", "alan")
        .execute()
        .await
        .unwrap();

    let inside = db.select("users").unwrap().fetch_all().await.unwrap();
    assert_eq!(inside.row_count(), 3);

    db.rollback().await.unwrap();

    // If the in-transaction select had been cached, this would still read 3
    let after = db.select("users").unwrap().fetch_all().await.unwrap();
    assert_eq!(after.row_count(), 2);
}

#[tokio::test]
async fn test_select_inside_transaction_sees_its_own_writes() {
    let db = setup_cached_db().await;

    // Prime the cache before the transaction opens
    let before = db.select("users").unwrap().fetch_all().await.unwrap();
    assert_eq!(before.row_count(), 2);

    db.begin_transaction().await.unwrap();
    // Raw writes do not invalidate; only the transaction gate keeps
    // the stale entry from masking this insert
    db.execute_raw("INSERT INTO users (name) VALUES ('alan')", &[])
        .await
        .unwrap();

    let inside = db.select("users").unwrap().fetch_all().await.unwrap();
    assert_eq!(inside.row_count(), 3);

    db.rollback().await.unwrap();
}

// =========================================================================
// File-backed cache
// =========================================================================

#[tokio::test]
async fn test_file_cache_backend_through_builders() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::from_json_str(
        r#"{ "main": { "driver": "sqlite", "database": ":memory:" } }"#,
    )
    .unwrap();
    let manager = Arc::new(ConnectionManager::with_settings(settings));
    manager
        .configure_cache(
            CacheOptions::File {
                dir: dir.path().to_path_buf(),
            },
            None,
        )
        .unwrap();
    let db = Database::new(manager);

    db.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();
    db.execute_raw("INSERT INTO t (id) VALUES (1)", &[]).await.unwrap();

    db.select("t").unwrap().fetch_all().await.unwrap();
    db.execute_raw("INSERT INTO t (id) VALUES (2)", &[]).await.unwrap();

    let cached = db.select("t").unwrap().fetch_all().await.unwrap();
    assert_eq!(cached.row_count(), 1, "expected the cached result");
}

#[tokio::test]
async fn test_without_cache_every_select_is_fresh() {
    let settings = Settings::from_json_str(
        r#"{ "main": { "driver": "sqlite", "database": ":memory:" } }"#,
    )
    .unwrap();
    let manager = Arc::new(ConnectionManager::with_settings(settings));
    let db = Database::new(manager);

    db.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();

    db.select("t").unwrap().fetch_all().await.unwrap();
    db.execute_raw("INSERT INTO t (id) VALUES (1)", &[]).await.unwrap();

    let fresh = db.select("t").unwrap().fetch_all().await.unwrap();
    assert_eq!(fresh.row_count(), 1);
}
