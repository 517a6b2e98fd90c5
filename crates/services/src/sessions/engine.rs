use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use speakup_core::ProgressionRules;
use speakup_core::model::{Exercise, UserId, UserProgress};
use storage::repository::{ContentStore, StorageError};
use storage::seed::starter_catalog;
use storage::subscription::Subscription;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::identity::IdentityProvider;
use super::state::{PendingCommit, SessionState};
use crate::error::ProgressError;

/// Drives one learning session against a live content store.
///
/// Owns at most one progress subscription and one catalog subscription.
/// State is published through a `watch` channel; every mutation goes through
/// [`SessionState`] so the async parts only decide *when* transitions happen.
///
/// Dropping the engine aborts both subscription tasks.
pub struct ProgressEngine {
    shared: Arc<Shared>,
}

struct Shared {
    store: Arc<dyn ContentStore>,
    rules: ProgressionRules,
    state: watch::Sender<SessionState>,
    tasks: Mutex<Tasks>,
    // Serializes catalog replacement so two streams never overlap.
    catalog_switch: AsyncMutex<()>,
}

#[derive(Default)]
struct Tasks {
    progress: Option<JoinHandle<()>>,
    catalog: Option<JoinHandle<()>>,
    closed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Progress,
    Catalog,
}

impl ProgressEngine {
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>, rules: ProgressionRules) -> Self {
        let (state, _) = watch::channel(SessionState::new());
        Self {
            shared: Arc::new(Shared {
                store,
                rules,
                state,
                tasks: Mutex::new(Tasks::default()),
                catalog_switch: AsyncMutex::new(()),
            }),
        }
    }

    /// Receiver that sees every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    #[must_use]
    pub fn rules(&self) -> ProgressionRules {
        self.shared.rules
    }

    /// Start a session for `user_id`, replacing any previous one.
    ///
    /// Each progress emission filters the loaded queue and subscribes to the
    /// catalog of the user's level again.
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Subscription` if the progress subscription
    /// cannot be opened. The state is moved to the error phase as well.
    pub async fn load_for_user(&self, user_id: UserId) -> Result<(), ProgressError> {
        self.shared.stop_tasks(false).await;
        self.shared.state.send_replace(SessionState::new());
        info!(user = %user_id, "loading session");

        let subscription = match self.shared.store.subscribe_progress(&user_id).await {
            Ok(subscription) => subscription,
            Err(err) => {
                let err = ProgressError::Subscription(err);
                self.shared.fail(&err);
                return Err(err);
            }
        };

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(shared.run_progress(user_id, subscription));
        self.shared.install(Slot::Progress, handle);
        Ok(())
    }

    /// Start a session for whoever `identity` reports as signed in.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::AuthenticationMissing` when nobody is signed in,
    /// or any error from [`Self::load_for_user`].
    pub async fn load_signed_in(
        &self,
        identity: &dyn IdentityProvider,
    ) -> Result<(), ProgressError> {
        match identity.current_user_id() {
            Some(user_id) => self.load_for_user(user_id).await,
            None => {
                self.shared.stop_tasks(false).await;
                let err = ProgressError::AuthenticationMissing;
                self.shared.state.send_modify(|state| {
                    *state = SessionState::new();
                    state.fail(&err);
                });
                Err(err)
            }
        }
    }

    /// Evaluate an answer for the exercise on screen.
    ///
    /// A correct answer is applied to the published state immediately; the
    /// returned task persists it and resolves to the write outcome. Wrong or
    /// ignored answers return `None`. Must be called within a Tokio runtime.
    pub fn submit_answer(
        &self,
        selected_index: usize,
    ) -> Option<JoinHandle<Result<(), ProgressError>>> {
        let rules = self.shared.rules;
        let mut commit = None;
        self.shared
            .state
            .send_modify(|state| commit = state.submit_answer(selected_index, &rules));

        let commit = commit?;
        let shared = Arc::clone(&self.shared);
        Some(tokio::spawn(shared.commit(commit)))
    }

    pub fn advance(&self) {
        self.shared.state.send_modify(SessionState::advance);
    }

    pub fn restart(&self) {
        self.shared.state.send_modify(SessionState::restart);
    }

    pub fn acknowledge_error(&self) {
        self.shared.state.send_modify(SessionState::acknowledge_error);
    }

    /// Write the starter catalog and reload the current level.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Persistence` if the batch write fails; the
    /// message is also shown in the session.
    pub async fn seed_catalog(&self) -> Result<(), ProgressError> {
        let mut target = None;
        self.shared
            .state
            .send_modify(|state| target = state.reload_catalog());

        let written = match starter_catalog() {
            Ok(catalog) => self
                .shared
                .store
                .batch_write_exercises(&catalog)
                .await
                .map(|()| catalog.len()),
            Err(err) => Err(StorageError::Serialization(err.to_string())),
        };
        match written {
            Ok(count) => info!(count, "seeded starter catalog"),
            Err(err) => {
                let err = ProgressError::Persistence(err);
                warn!(error = %err, "seeding catalog failed");
                self.shared.state.send_modify(|state| state.report(&err));
                return Err(err);
            }
        }

        if let Some(level) = target {
            Arc::clone(&self.shared).start_catalog(level).await;
        }
        Ok(())
    }

    /// Cancel both subscriptions and wait until they are released.
    pub async fn shutdown(&self) {
        self.shared.stop_tasks(true).await;
        debug!("session shut down");
    }
}

impl Drop for ProgressEngine {
    fn drop(&mut self) {
        let mut tasks = self.shared.tasks();
        tasks.closed = true;
        for handle in [tasks.progress.take(), tasks.catalog.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

//
// ─── TASKS ─────────────────────────────────────────────────────────────────────
//

impl Shared {
    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, err: &ProgressError) {
        warn!(error = %err, "session failed");
        self.state.send_modify(|state| state.fail(err));
    }

    /// Store `handle` in its slot, aborting whatever was there. A closed
    /// engine refuses new tasks.
    fn install(&self, slot: Slot, handle: JoinHandle<()>) {
        let mut tasks = self.tasks();
        if tasks.closed {
            handle.abort();
            return;
        }
        let slot = match slot {
            Slot::Progress => &mut tasks.progress,
            Slot::Catalog => &mut tasks.catalog,
        };
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    async fn stop_tasks(&self, close: bool) {
        let _switch = self.catalog_switch.lock().await;
        let handles = {
            let mut tasks = self.tasks();
            tasks.closed = close;
            [tasks.progress.take(), tasks.catalog.take()]
        };
        for handle in handles.into_iter().flatten() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Replace the catalog subscription with one for `level`.
    ///
    /// The old task is aborted and awaited first, which drops its
    /// subscription before the new one is opened.
    async fn start_catalog(self: Arc<Self>, level: &'static str) {
        let _switch = self.catalog_switch.lock().await;

        let previous = self.tasks().catalog.take();
        if let Some(previous) = previous {
            previous.abort();
            let _ = previous.await;
        }
        if self.tasks().closed {
            return;
        }

        debug!(level, "subscribing to catalog");
        let subscription = match self.store.subscribe_exercises(level).await {
            Ok(subscription) => subscription,
            Err(err) => {
                self.fail(&ProgressError::Subscription(err));
                return;
            }
        };

        let handle = tokio::spawn(Arc::clone(&self).run_catalog(level, subscription));
        self.install(Slot::Catalog, handle);
    }

    async fn run_progress(
        self: Arc<Self>,
        user_id: UserId,
        mut subscription: Subscription<Option<UserProgress>>,
    ) {
        while let Some(item) = subscription.next().await {
            let progress = match item {
                Ok(progress) => progress.unwrap_or_else(|| UserProgress::fresh(user_id.clone())),
                Err(err) => {
                    self.fail(&ProgressError::Subscription(err));
                    return;
                }
            };

            let mut level = None;
            self.state
                .send_modify(|state| level = Some(state.apply_progress(progress)));
            if let Some(level) = level {
                Arc::clone(&self).start_catalog(level).await;
            }
        }
        debug!(user = %user_id, "progress subscription ended");
    }

    async fn run_catalog(
        self: Arc<Self>,
        level: &'static str,
        mut subscription: Subscription<Vec<Exercise>>,
    ) {
        while let Some(item) = subscription.next().await {
            match item {
                Ok(exercises) => {
                    let count = exercises.len();
                    let mut applied = false;
                    self.state
                        .send_modify(|state| applied = state.apply_catalog(level, exercises));
                    if applied {
                        debug!(level, count, "catalog applied");
                    } else {
                        debug!(level, "stale catalog ignored");
                    }
                }
                Err(err) => {
                    self.fail(&ProgressError::Subscription(err));
                    return;
                }
            }
        }
    }

    /// Persist an already-applied progress value.
    ///
    /// A failed write is reported but not rolled back; the next progress
    /// push reconciles. A level change still moves the catalog.
    async fn commit(self: Arc<Self>, commit: PendingCommit) -> Result<(), ProgressError> {
        let result = self
            .store
            .merge_progress(&commit.progress)
            .await
            .map_err(ProgressError::Persistence);

        match &result {
            Ok(()) if commit.leveled_up => info!(
                user = %commit.progress.user_id(),
                tier = commit.progress.tier().value(),
                "level up"
            ),
            Ok(()) => debug!(user = %commit.progress.user_id(), "progress saved"),
            Err(err) => {
                warn!(error = %err, "progress write failed");
                self.state.send_modify(|state| state.report(err));
            }
        }

        // A saved value comes back through the progress stream, which moves
        // the catalog. A failed one never does.
        if let (Err(_), Some(level)) = (&result, commit.resubscribe) {
            Arc::clone(&self).start_catalog(level).await;
        }
        result
    }
}
