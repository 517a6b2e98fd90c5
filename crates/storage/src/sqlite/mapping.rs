use serde_json::Value;
use speakup_core::model::{Exercise, UserProgress};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::debug;

use crate::document;
use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn parse_body(raw: &str) -> Result<Value, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

/// Decode an exercise row, or `None` if the stored document is malformed.
pub(crate) fn map_exercise_row(row: &SqliteRow) -> Result<Option<Exercise>, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let raw: String = row.try_get("body").map_err(ser)?;

    let decoded = parse_body(&raw).and_then(|doc| {
        document::decode_exercise(&id, &doc).map_err(ser)
    });
    match decoded {
        Ok(exercise) => Ok(Some(exercise)),
        Err(err) => {
            debug!(collection = document::EXERCISES, key = id.as_str(), %err, "skipping malformed document");
            Ok(None)
        }
    }
}

/// Decode a progress row; a malformed document reads as absent.
pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<Option<UserProgress>, StorageError> {
    let uid: String = row.try_get("uid").map_err(ser)?;
    let raw: String = row.try_get("body").map_err(ser)?;

    let decoded = parse_body(&raw).and_then(|doc| {
        document::decode_progress(&uid, &doc).map_err(ser)
    });
    match decoded {
        Ok(progress) => Ok(Some(progress)),
        Err(err) => {
            debug!(collection = document::USER_PROGRESS, key = uid.as_str(), %err, "treating malformed document as absent");
            Ok(None)
        }
    }
}
