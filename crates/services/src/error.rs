//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Failures the progress engine surfaces to the UI.
///
/// None of these end the session; already-loaded data stays usable.
/// Malformed documents are handled inside the store and never appear here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("no signed-in user")]
    AuthenticationMissing,
    #[error("live subscription failed: {0}")]
    Subscription(#[source] StorageError),
    #[error("could not persist: {0}")]
    Persistence(#[source] StorageError),
}

impl ProgressError {
    /// One-shot message shown to the user until acknowledged.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationMissing => "You are not signed in.".to_owned(),
            Self::Subscription(err) => format!("Could not load your lessons: {err}"),
            Self::Persistence(err) => format!("Could not save your progress: {err}"),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let err = ProgressError::Persistence(StorageError::Connection("timeout".into()));
        assert_eq!(
            err.user_message(),
            "Could not save your progress: connection error: timeout"
        );
        assert_eq!(
            ProgressError::AuthenticationMissing.user_message(),
            "You are not signed in."
        );
    }
}
