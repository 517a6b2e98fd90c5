use std::time::Duration;

use speakup_core::model::{ExerciseId, LevelTier, UserId, UserProgress};
use storage::repository::{ContentStore, StorageError};
use storage::seed::starter_catalog;
use storage::sqlite::SqliteStore;
use storage::subscription::Subscription;

async fn connect(name: &str) -> SqliteStore {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let store = SqliteStore::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    store
}

async fn next_value<T>(sub: &mut Subscription<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), sub.next())
        .await
        .expect("value within timeout")
        .expect("stream open")
        .expect("no transport error")
}

#[tokio::test]
async fn sqlite_batch_write_is_queryable_by_level() {
    let store = connect("memdb_catalog").await;
    let catalog = starter_catalog().unwrap();
    store.batch_write_exercises(&catalog).await.unwrap();

    let mut a1 = store.subscribe_exercises("A1").await.unwrap();
    let exercises = next_value(&mut a1).await;
    assert_eq!(exercises, catalog);

    let mut a2 = store.subscribe_exercises("A2").await.unwrap();
    assert!(next_value(&mut a2).await.is_empty());
}

#[tokio::test]
async fn sqlite_progress_merge_creates_then_updates() {
    let store = connect("memdb_progress").await;
    let uid = UserId::new("uid-1");

    let mut sub = store.subscribe_progress(&uid).await.unwrap();
    assert_eq!(next_value(&mut sub).await, None);

    let first = UserProgress::from_persisted(uid.clone(), LevelTier::FIRST, 10, [ExerciseId::new("a1_001")]);
    store.merge_progress(&first).await.unwrap();
    assert_eq!(next_value(&mut sub).await, Some(first));

    let second = UserProgress::from_persisted(uid.clone(), LevelTier::new(2), 40, []);
    store.merge_progress(&second).await.unwrap();
    assert_eq!(next_value(&mut sub).await, Some(second));
}

#[tokio::test]
async fn sqlite_exercise_subscription_sees_later_writes() {
    let store = connect("memdb_live").await;
    let mut sub = store.subscribe_exercises("A1").await.unwrap();
    assert!(next_value(&mut sub).await.is_empty());

    let catalog = starter_catalog().unwrap();
    store.batch_write_exercises(&catalog).await.unwrap();
    assert_eq!(next_value(&mut sub).await.len(), 5);
}

#[tokio::test]
async fn sqlite_progress_subscription_ignores_other_users() {
    let store = connect("memdb_other_users").await;
    let mine = UserId::new("mine");
    let mut sub = store.subscribe_progress(&mine).await.unwrap();
    assert_eq!(next_value(&mut sub).await, None);

    let theirs = UserProgress::fresh(UserId::new("theirs"));
    store.merge_progress(&theirs).await.unwrap();
    let ours = UserProgress::fresh(mine.clone());
    store.merge_progress(&ours).await.unwrap();

    // The first value after our own write is ours; the other user's write
    // never reached this subscription.
    assert_eq!(next_value(&mut sub).await, Some(ours));
}

#[tokio::test]
async fn sqlite_malformed_rows_are_skipped() {
    let store = connect("memdb_malformed").await;
    store.batch_write_exercises(&starter_catalog().unwrap()).await.unwrap();
    sqlx::query("INSERT INTO exercises (id, level, body, updated_at) VALUES ('zz', 'A1', 'not json', '2024-01-01T00:00:00Z')")
        .execute(store.pool())
        .await
        .unwrap();

    let mut sub = store.subscribe_exercises("A1").await.unwrap();
    assert_eq!(next_value(&mut sub).await.len(), 5);
}

#[tokio::test]
async fn sqlite_merge_preserves_foreign_fields() {
    let store = connect("memdb_merge").await;
    sqlx::query(
        r#"INSERT INTO user_progress (uid, body, updated_at) VALUES ('u1', '{"uid":"u1","displayName":"Ana"}', '2024-01-01T00:00:00Z')"#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    let progress = UserProgress::from_persisted(UserId::new("u1"), LevelTier::FIRST, 10, []);
    store.merge_progress(&progress).await.unwrap();

    let body: (String,) = sqlx::query_as("SELECT body FROM user_progress WHERE uid = 'u1'")
        .fetch_one(store.pool())
        .await
        .unwrap();
    let doc: serde_json::Value = serde_json::from_str(&body.0).unwrap();
    assert_eq!(doc["displayName"], "Ana");
    assert_eq!(doc["xpPoints"], 10);
}

#[tokio::test]
async fn sqlite_dropped_subscription_stops_receiving() {
    let store = connect("memdb_drop").await;
    let sub = store.subscribe_exercises("A1").await.unwrap();
    drop(sub);

    // Writes after the subscriber is gone must still succeed.
    let result: Result<(), StorageError> = store
        .batch_write_exercises(&starter_catalog().unwrap())
        .await;
    assert!(result.is_ok());
}
