use std::sync::Arc;
use std::time::Duration;

use speakup_core::Clock;
use speakup_core::model::UserId;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::repository::{ContentStore, Storage};

mod exercise_repo;
mod live;
mod mapping;
mod migrate;
mod progress_repo;

/// Capacity of the in-process change feed. Slow listeners re-query on lag.
const CHANGE_FEED_CAPACITY: usize = 64;

/// A committed write, broadcast to live subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Change {
    Exercises,
    Progress(UserId),
}

/// Durable document store on `SQLite` with live subscriptions.
///
/// Subscriptions re-query after each write made through this handle (or a
/// clone of it). Writes from other processes are picked up on the next local
/// write only.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    clock: Clock,
    changes: broadcast::Sender<Change>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteStore {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or if
    /// the connection pragmas cannot be applied.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            pool,
            clock: Clock::default(),
            changes,
        })
    }

    /// Use `clock` for `updated_at` stamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool, self.clock).await
    }

    pub(crate) fn publish(&self, change: Change) {
        // No receivers simply means no live subscriptions.
        let _ = self.changes.send(change);
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str, clock: Clock) -> Result<Self, SqliteInitError> {
        let store = SqliteStore::connect(database_url).await?.with_clock(clock);
        store.migrate().await?;
        let content: Arc<dyn ContentStore> = Arc::new(store);
        Ok(Self { content })
    }
}
