use async_trait::async_trait;
use speakup_core::model::{Exercise, UserId, UserProgress};
use std::sync::Arc;
use thiserror::Error;

use crate::memory::InMemoryStore;
use crate::subscription::Subscription;

/// Errors surfaced by store adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Contract the progress engine needs from a reactive document store.
///
/// Collections are fixed: `exercises` (queried by level label) and
/// `userProgress` (keyed by user id).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Live query of the exercises whose `level` equals `level`.
    ///
    /// Malformed documents are skipped, never reported.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listener cannot be registered.
    async fn subscribe_exercises(
        &self,
        level: &str,
    ) -> Result<Subscription<Vec<Exercise>>, StorageError>;

    /// Live read of one user's progress; `None` while no record exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listener cannot be registered.
    async fn subscribe_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Subscription<Option<UserProgress>>, StorageError>;

    /// Create or update the full progress document for `progress.user_id()`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport failure. A missing prior record is
    /// not an error.
    async fn merge_progress(&self, progress: &UserProgress) -> Result<(), StorageError>;

    /// Write all exercises or none of them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the batch cannot be committed.
    async fn batch_write_exercises(&self, exercises: &[Exercise]) -> Result<(), StorageError>;
}

/// Store handle behind a trait object so the backend can be swapped.
#[derive(Clone)]
pub struct Storage {
    pub content: Arc<dyn ContentStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            content: Arc::new(InMemoryStore::new()),
        }
    }
}
