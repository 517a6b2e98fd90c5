//! Reactive in-memory document store for tests and prototyping.

use async_trait::async_trait;
use serde_json::Value;
use speakup_core::model::{Exercise, UserId, UserProgress};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

use crate::document;
use crate::repository::{ContentStore, StorageError};
use crate::subscription::{self, Emitter, Subscription};

type ListenerId = u64;

#[derive(Default)]
struct State {
    exercises: BTreeMap<String, Value>,
    progress: BTreeMap<String, Value>,
    exercise_listeners: HashMap<ListenerId, (String, Emitter<Vec<Exercise>>)>,
    progress_listeners: HashMap<ListenerId, (UserId, Emitter<Option<UserProgress>>)>,
    next_listener: ListenerId,
    write_failure: Option<String>,
    subscribe_failure: Option<String>,
    progress_writes: usize,
}

impl State {
    fn allocate_listener(&mut self) -> ListenerId {
        self.next_listener += 1;
        self.next_listener
    }

    fn exercises_for(&self, level: &str) -> Vec<Exercise> {
        self.exercises
            .iter()
            .filter_map(|(key, doc)| match document::decode_exercise(key, doc) {
                Ok(exercise) => Some(exercise),
                Err(err) => {
                    debug!(collection = document::EXERCISES, key = key.as_str(), %err, "skipping malformed document");
                    None
                }
            })
            .filter(|exercise| exercise.level() == level)
            .collect()
    }

    fn progress_for(&self, user_id: &UserId) -> Option<UserProgress> {
        let key = user_id.as_str();
        let doc = self.progress.get(key)?;
        match document::decode_progress(key, doc) {
            Ok(progress) => Some(progress),
            Err(err) => {
                debug!(collection = document::USER_PROGRESS, key, %err, "treating malformed document as absent");
                None
            }
        }
    }

    fn notify_exercises(&mut self) {
        let snapshots: Vec<_> = self
            .exercise_listeners
            .iter()
            .map(|(id, (level, _))| (*id, self.exercises_for(level)))
            .collect();
        for (id, snapshot) in snapshots {
            let delivered = self
                .exercise_listeners
                .get(&id)
                .is_some_and(|(_, emitter)| emitter.push(snapshot));
            if !delivered {
                self.exercise_listeners.remove(&id);
            }
        }
    }

    fn notify_progress(&mut self, user_id: &UserId) {
        let snapshot = self.progress_for(user_id);
        self.progress_listeners.retain(|_, (owner, emitter)| {
            *owner != *user_id || emitter.push(snapshot.clone())
        });
    }
}

/// Reactive store keeping raw documents in memory.
///
/// Every write is pushed to the live subscriptions it affects. Failure
/// injection hooks let callers exercise transport error paths.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Store a raw exercise document, bypassing validation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn put_exercise_document(&self, key: &str, doc: Value) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.exercises.insert(key.to_owned(), doc);
        state.notify_exercises();
        Ok(())
    }

    /// Store a raw progress document, bypassing validation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn put_progress_document(&self, user_id: &UserId, doc: Value) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.progress.insert(user_id.as_str().to_owned(), doc);
        state.notify_progress(user_id);
        Ok(())
    }

    /// Decoded progress as stored, if any.
    #[must_use]
    pub fn stored_progress(&self, user_id: &UserId) -> Option<UserProgress> {
        self.lock().ok().and_then(|state| state.progress_for(user_id))
    }

    /// Make the next write fail with a connection error.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.lock() {
            state.write_failure = Some(message.into());
        }
    }

    /// Make new subscriptions fail (`Some`) or succeed again (`None`).
    pub fn fail_subscriptions(&self, message: Option<String>) {
        if let Ok(mut state) = self.lock() {
            state.subscribe_failure = message;
        }
    }

    /// Push a transport error into every live subscription and drop them.
    pub fn break_subscriptions(&self, message: &str) {
        if let Ok(mut state) = self.lock() {
            for (_, (_, emitter)) in state.exercise_listeners.drain() {
                emitter.fail(StorageError::Connection(message.to_owned()));
            }
            for (_, (_, emitter)) in state.progress_listeners.drain() {
                emitter.fail(StorageError::Connection(message.to_owned()));
            }
        }
    }

    /// Number of listeners currently registered.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.lock().map_or(0, |state| {
            state
                .exercise_listeners
                .values()
                .filter(|(_, e)| !e.is_closed())
                .count()
                + state
                    .progress_listeners
                    .values()
                    .filter(|(_, e)| !e.is_closed())
                    .count()
        })
    }

    /// Number of successful progress writes.
    #[must_use]
    pub fn progress_writes(&self) -> usize {
        self.lock().map_or(0, |state| state.progress_writes)
    }
}

fn unregister_hook(state: Weak<Mutex<State>>, id: ListenerId) -> impl FnOnce() + Send + 'static {
    move || {
        if let Some(state) = state.upgrade() {
            if let Ok(mut state) = state.lock() {
                state.exercise_listeners.remove(&id);
                state.progress_listeners.remove(&id);
            }
        }
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn subscribe_exercises(
        &self,
        level: &str,
    ) -> Result<Subscription<Vec<Exercise>>, StorageError> {
        let mut state = self.lock()?;
        if let Some(message) = state.subscribe_failure.clone() {
            return Ok(Subscription::failed(StorageError::Connection(message)));
        }

        let (emitter, subscription) = subscription::channel();
        emitter.push(state.exercises_for(level));
        let id = state.allocate_listener();
        state
            .exercise_listeners
            .insert(id, (level.to_owned(), emitter));
        debug!(listener = id, level, "exercise subscription registered");

        Ok(subscription.on_cancel(unregister_hook(Arc::downgrade(&self.state), id)))
    }

    async fn subscribe_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Subscription<Option<UserProgress>>, StorageError> {
        let mut state = self.lock()?;
        if let Some(message) = state.subscribe_failure.clone() {
            return Ok(Subscription::failed(StorageError::Connection(message)));
        }

        let (emitter, subscription) = subscription::channel();
        emitter.push(state.progress_for(user_id));
        let id = state.allocate_listener();
        state
            .progress_listeners
            .insert(id, (user_id.clone(), emitter));
        debug!(listener = id, user = %user_id, "progress subscription registered");

        Ok(subscription.on_cancel(unregister_hook(Arc::downgrade(&self.state), id)))
    }

    async fn merge_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let incoming = document::encode_progress(progress)?;
        let mut state = self.lock()?;
        if let Some(message) = state.write_failure.take() {
            return Err(StorageError::Connection(message));
        }

        let key = progress.user_id().as_str().to_owned();
        let existing = state.progress.remove(&key);
        state.progress.insert(key, document::merge(existing, incoming));
        state.progress_writes += 1;
        state.notify_progress(progress.user_id());
        Ok(())
    }

    async fn batch_write_exercises(&self, exercises: &[Exercise]) -> Result<(), StorageError> {
        let docs = exercises
            .iter()
            .map(|exercise| {
                document::encode_exercise(exercise)
                    .map(|doc| (exercise.id().as_str().to_owned(), doc))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.lock()?;
        if let Some(message) = state.write_failure.take() {
            return Err(StorageError::Connection(message));
        }
        state.exercises.extend(docs);
        state.notify_exercises();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use speakup_core::model::{ExerciseDraft, ExerciseId, ExerciseKind, LevelTier};

    fn exercise(id: &str, level: &str) -> Exercise {
        ExerciseDraft {
            id: ExerciseId::new(id),
            level: level.into(),
            kind: ExerciseKind::MultipleChoice,
            prompt: format!("Q {id}"),
            options: vec!["a".into(), "b".into()],
            correct_option_index: 1,
            explanation: String::new(),
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn exercise_subscription_emits_initial_and_updates() {
        let store = InMemoryStore::new();
        store
            .batch_write_exercises(&[exercise("a1_001", "A1"), exercise("a2_001", "A2")])
            .await
            .unwrap();

        let mut sub = store.subscribe_exercises("A1").await.unwrap();
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        store
            .batch_write_exercises(&[exercise("a1_002", "A1")])
            .await
            .unwrap();
        let second = sub.next().await.unwrap().unwrap();
        let ids: Vec<_> = second.iter().map(|e| e.id().as_str().to_owned()).collect();
        assert_eq!(ids, ["a1_001", "a1_002"]);
    }

    #[tokio::test]
    async fn malformed_documents_are_skipped() {
        let store = InMemoryStore::new();
        store
            .put_exercise_document("bad", json!({ "level": "A1", "options": ["x"], "correctAnswerIndex": 9 }))
            .unwrap();
        store
            .batch_write_exercises(&[exercise("a1_001", "A1")])
            .await
            .unwrap();

        let mut sub = store.subscribe_exercises("A1").await.unwrap();
        let list = sub.next().await.unwrap().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id().as_str(), "a1_001");
    }

    #[tokio::test]
    async fn progress_subscription_reports_absent_then_written() {
        let store = InMemoryStore::new();
        let uid = UserId::new("u1");
        let mut sub = store.subscribe_progress(&uid).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), None);

        let progress = UserProgress::from_persisted(uid.clone(), LevelTier::new(2), 20, []);
        store.merge_progress(&progress).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), Some(progress));
        assert_eq!(store.progress_writes(), 1);
    }

    #[tokio::test]
    async fn failed_write_changes_nothing() {
        let store = InMemoryStore::new();
        store.fail_next_write("offline");

        let err = store
            .batch_write_exercises(&[exercise("a1_001", "A1")])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));

        let mut sub = store.subscribe_exercises("A1").await.unwrap();
        assert!(sub.next().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters_listener() {
        let store = InMemoryStore::new();
        let sub = store.subscribe_exercises("A1").await.unwrap();
        let other = store.subscribe_progress(&UserId::new("u1")).await.unwrap();
        assert_eq!(store.active_subscriptions(), 2);

        drop(sub);
        other.cancel();
        assert_eq!(store.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn broken_subscriptions_report_error() {
        let store = InMemoryStore::new();
        let mut sub = store.subscribe_exercises("A1").await.unwrap();
        let _ = sub.next().await;

        store.break_subscriptions("network lost");
        assert!(matches!(sub.next().await, Some(Err(StorageError::Connection(_)))));
        assert!(sub.next().await.is_none());
    }
}
