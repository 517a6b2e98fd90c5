use async_trait::async_trait;
use speakup_core::model::{Exercise, UserId, UserProgress};
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::exercise_repo::load_level;
use super::progress_repo::load_progress;
use super::{Change, SqliteStore};
use crate::repository::{ContentStore, StorageError};
use crate::subscription::{self, Emitter, Subscription};

/// Feed one subscriber: push the initial value, then re-query on every
/// relevant change until the subscriber goes away or a query fails.
async fn pump<T, Q, Fut>(
    emitter: Emitter<T>,
    mut changes: broadcast::Receiver<Change>,
    relevant: impl Fn(&Change) -> bool,
    query: Q,
) where
    Q: Fn() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    loop {
        let refresh = tokio::select! {
            () = emitter.closed() => break,
            change = changes.recv() => match change {
                Ok(change) => relevant(&change),
                // Missed changes: the safe answer is to re-query.
                Err(RecvError::Lagged(_)) => true,
                Err(RecvError::Closed) => break,
            },
        };
        if !refresh {
            continue;
        }
        match query().await {
            Ok(value) => {
                if !emitter.push(value) {
                    break;
                }
            }
            Err(err) => {
                emitter.fail(err);
                return;
            }
        }
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn subscribe_exercises(
        &self,
        level: &str,
    ) -> Result<Subscription<Vec<Exercise>>, StorageError> {
        // Listen before the first read so no write slips between them.
        let changes = self.changes.subscribe();
        let initial = load_level(&self.pool, level).await?;

        let (emitter, subscription) = subscription::channel();
        emitter.push(initial);

        let pool = self.pool.clone();
        let level = level.to_owned();
        debug!(level = level.as_str(), "exercise subscription registered");
        tokio::spawn(async move {
            pump(
                emitter,
                changes,
                |change| matches!(change, Change::Exercises),
                || load_level(&pool, &level),
            )
            .await;
            debug!(level = level.as_str(), "exercise subscription ended");
        });

        Ok(subscription)
    }

    async fn subscribe_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Subscription<Option<UserProgress>>, StorageError> {
        let changes = self.changes.subscribe();
        let initial = load_progress(&self.pool, user_id).await?;

        let (emitter, subscription) = subscription::channel();
        emitter.push(initial);

        let pool = self.pool.clone();
        let user_id = user_id.clone();
        debug!(user = %user_id, "progress subscription registered");
        tokio::spawn(async move {
            pump(
                emitter,
                changes,
                |change| matches!(change, Change::Progress(owner) if *owner == user_id),
                || load_progress(&pool, &user_id),
            )
            .await;
            debug!(user = %user_id, "progress subscription ended");
        });

        Ok(subscription)
    }

    async fn merge_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        self.write_progress(progress).await
    }

    async fn batch_write_exercises(&self, exercises: &[Exercise]) -> Result<(), StorageError> {
        self.write_exercises(exercises).await
    }
}
