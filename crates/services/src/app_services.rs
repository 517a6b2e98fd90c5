use std::sync::Arc;

use speakup_core::ProgressionRules;
use storage::repository::{ContentStore, Storage};

use crate::Clock;
use crate::error::{AppServicesError, ProgressError};
use crate::sessions::{IdentityProvider, ProgressEngine};

/// Assembles the store, identity and progress engine for a front end.
#[derive(Clone)]
pub struct AppServices {
    store: Arc<dyn ContentStore>,
    identity: Arc<dyn IdentityProvider>,
    engine: Arc<ProgressEngine>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url, clock).await?;
        Ok(Self::from_storage(&storage, identity))
    }

    /// Build services over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(identity: Arc<dyn IdentityProvider>) -> Self {
        Self::from_storage(&Storage::in_memory(), identity)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, identity: Arc<dyn IdentityProvider>) -> Self {
        let store = Arc::clone(&storage.content);
        let engine = Arc::new(ProgressEngine::new(
            Arc::clone(&store),
            ProgressionRules::default(),
        ));
        Self {
            store,
            identity,
            engine,
        }
    }

    /// Load the session for the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::AuthenticationMissing` when nobody is signed in,
    /// or a subscription error from the store.
    pub async fn start_session(&self) -> Result<(), ProgressError> {
        self.engine.load_signed_in(self.identity.as_ref()).await
    }

    #[must_use]
    pub fn engine(&self) -> Arc<ProgressEngine> {
        Arc::clone(&self.engine)
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn ContentStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.identity)
    }
}
