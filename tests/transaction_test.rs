//! Integration tests for transactions through the facade.

use dbcore::{ConnectionManager, Database, Error, Settings};
use std::sync::Arc;

async fn setup_db() -> Database {
    let settings = Settings::from_json_str(
        r#"{ "main": { "driver": "sqlite", "database": ":memory:" } }"#,
    )
    .unwrap();
    let manager = Arc::new(ConnectionManager::with_settings(settings));
    let db = Database::new(manager);
    db.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &[])
        .await
        .unwrap();
    db
}

// =========================================================================
// Explicit begin/commit/rollback
// =========================================================================

#[tokio::test]
async fn test_commit_persists_writes() {
    let db = setup_db().await;

    db.begin_transaction().await.unwrap();
    db.insert("t").unwrap().value("name", "a").execute().await.unwrap();
    db.commit().await.unwrap();

    let rows = db.select("t").unwrap().fetch_all().await.unwrap();
    assert_eq!(rows.row_count(), 1);
}

#[tokio::test]
async fn test_rollback_discards_writes() {
    let db = setup_db().await;

    db.begin_transaction().await.unwrap();
    db.insert("t").unwrap().value("name", "a").execute().await.unwrap();
    db.rollback().await.unwrap();

    let rows = db.select("t").unwrap().fetch_all().await.unwrap();
    assert_eq!(rows.row_count(), 0);
}

#[tokio::test]
async fn test_second_begin_fails_without_disturbing_the_first() {
    let db = setup_db().await;

    db.begin_transaction().await.unwrap();
    db.insert("t").unwrap().value("name", "a").execute().await.unwrap();
    assert!(db.begin_transaction().await.is_err());

    // the open transaction is still intact
    db.commit().await.unwrap();
    let rows = db.select("t").unwrap().fetch_all().await.unwrap();
    assert_eq!(rows.row_count(), 1);
}

#[tokio::test]
async fn test_commit_without_begin_is_an_error() {
    let db = setup_db().await;
    assert!(db.commit().await.is_err());
    assert!(db.rollback().await.is_err());
}

// =========================================================================
// Closure transactions
// =========================================================================

#[tokio::test]
async fn test_transaction_commits_on_ok() {
    let db = setup_db().await;

    let inserted = db
        .transaction(|tx| async move {
            tx.insert("t").unwrap().value("name", "a").execute().await?;
            tx.insert("t").unwrap().value("name", "b").execute().await
        })
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let rows = db.select("t").unwrap().fetch_all().await.unwrap();
    assert_eq!(rows.row_count(), 2);
}

#[tokio::test]
async fn test_transaction_rolls_back_on_err() {
    let db = setup_db().await;

    let result: Result<(), Error> = db
        .transaction(|tx| async move {
            tx.insert("t").unwrap().value("name", "a").execute().await?;
            // unknown column makes the second statement fail
            tx.insert("t").unwrap().value("shoe_size", 44).execute().await?;
            Ok(())
        })
        .await;
    assert!(result.is_err());

    let rows = db.select("t").unwrap().fetch_all().await.unwrap();
    assert_eq!(rows.row_count(), 0, "the first insert must be rolled back");
}

#[tokio::test]
async fn test_transaction_propagates_the_original_error() {
    let db = setup_db().await;

    let err = db
        .transaction(|tx| async move {
            tx.raw("SELECT * FROM missing_table", &[]).await?;
            Ok(())
        })
        .await
        .unwrap_err();

    // the closure's error comes back unmodified, with its statement context
    assert!(err.query().unwrap().contains("missing_table"));
}

#[tokio::test]
async fn test_transactions_are_sequential_per_connection() {
    let db = setup_db().await;

    db.transaction(|tx| async move {
        tx.insert("t").unwrap().value("name", "a").execute().await
    })
    .await
    .unwrap();

    // a second transaction after the first completed works fine
    db.transaction(|tx| async move {
        tx.insert("t").unwrap().value("name", "b").execute().await
    })
    .await
    .unwrap();

    let rows = db.select("t").unwrap().fetch_all().await.unwrap();
    assert_eq!(rows.row_count(), 2);
}
