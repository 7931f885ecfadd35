//! MySQL session store tests.
//!
//! Requires Docker (or `SESSIONS_TEST_MYSQL_URL`); run with `--ignored`.

use integration_tests::containers::TestContainers;
use integration_tests::fixtures::*;
use session_store::{LocalSessionStore, MySqlSessionStore, StoreConfig, StoreScope};
use sessions_core::{LocalRow, RowUpdate};
use sqlx::mysql::MySqlPool;

async fn insert(pool: &MySqlPool, row: &LocalRow) {
    sqlx::query(
        "INSERT INTO `session` (sess_id, changed, ip, vars, user_agent, location) \
         VALUES (?, NOW(), ?, ?, NULLIF(?, ''), NULLIF(?, ''))",
    )
    .bind(&row.sess_id)
    .bind(&row.ip)
    .bind(&row.vars)
    .bind(&row.user_agent)
    .bind(&row.location)
    .execute(pool)
    .await
    .expect("Failed to insert session row");
}

async fn store(containers: &TestContainers) -> MySqlSessionStore {
    MySqlSessionStore::new(StoreConfig {
        url: containers.mysql_url.clone(),
        ..StoreConfig::default()
    })
    .expect("Failed to create store")
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_mysql_store_lifecycle() {
    let containers = TestContainers::start().await;
    let pool = containers.reset_schema().await;

    insert(&pool, &session_row("s1", "alice", "10.0.0.1", FIREFOX_UA)).await;
    insert(&pool, &session_row("s2", "bob", "10.0.0.2", CHROME_UA)).await;
    insert(&pool, &session_row("s3", "alice", "10.0.0.3", "")).await;

    let store = store(&containers).await;
    store.ping().await.unwrap();

    // Rows without a user agent stay hidden.
    let listed = store.list_with_user_agent(&StoreScope::Global).await.unwrap();
    let mut ids: Vec<_> = listed.iter().map(|r| r.sess_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["s1", "s2"]);
    assert!(listed.iter().all(|r| r.changed.is_some()));

    let scoped = store
        .list_with_user_agent(&StoreScope::Actor("bob".into()))
        .await
        .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].sess_id, "s2");

    let affected = store
        .update_row(
            "s3",
            &RowUpdate {
                user_agent: Some(FIREFOX_UA.into()),
                location: Some("Berlin, Land Berlin, Germany".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);
    let row = store.get_row("s3").await.unwrap().unwrap();
    assert_eq!(row.user_agent, FIREFOX_UA);
    assert_eq!(row.location, "Berlin, Land Berlin, Germany");

    assert_eq!(store.delete_one("s1").await.unwrap(), 1);
    assert_eq!(store.delete_one("s1").await.unwrap(), 0);
    assert!(store.get_row("s1").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_mysql_bulk_delete_scopes() {
    let containers = TestContainers::start().await;
    let pool = containers.reset_schema().await;

    insert(&pool, &session_row("s1", "alice", "10.0.0.1", FIREFOX_UA)).await;
    insert(&pool, &session_row("s2", "bob", "10.0.0.2", CHROME_UA)).await;
    insert(&pool, &session_row("s3", "alice", "10.0.0.3", CHROME_UA)).await;
    // Anonymous row with no payload survives every bulk delete.
    insert(
        &pool,
        &LocalRow {
            vars: String::new(),
            ..session_row("s4", "nobody", "10.0.0.4", "")
        },
    )
    .await;

    let store = store(&containers).await;

    let deleted = store
        .delete_all_with_payload(&StoreScope::Actor("alice".into()))
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert!(store.get_row("s2").await.unwrap().is_some());

    let deleted = store.delete_all_with_payload(&StoreScope::Global).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(store.get_row("s4").await.unwrap().is_some());
}
