use speakup_core::model::{UserId, UserProgress};
use sqlx::{Row, SqlitePool};

use super::mapping::{conn, map_progress_row, parse_body, ser};
use super::{Change, SqliteStore};
use crate::document;
use crate::repository::StorageError;

pub(crate) async fn load_progress(
    pool: &SqlitePool,
    user_id: &UserId,
) -> Result<Option<UserProgress>, StorageError> {
    let row = sqlx::query("SELECT uid, body FROM user_progress WHERE uid = ?1")
        .bind(user_id.as_str())
        .fetch_optional(pool)
        .await
        .map_err(conn)?;

    match row {
        Some(row) => map_progress_row(&row),
        None => Ok(None),
    }
}

impl SqliteStore {
    /// Merge the progress document over whatever is stored for the user.
    pub(crate) async fn write_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let incoming = document::encode_progress(progress)?;
        let uid = progress.user_id().as_str();

        let mut tx = self.pool.begin().await.map_err(conn)?;
        let existing = sqlx::query("SELECT body FROM user_progress WHERE uid = ?1")
            .bind(uid)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        let existing = match existing {
            Some(row) => {
                let raw: String = row.try_get("body").map_err(ser)?;
                parse_body(&raw).ok()
            }
            None => None,
        };
        let merged = document::merge(existing, incoming);

        sqlx::query(
            r"
            INSERT INTO user_progress (uid, body, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(uid) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            ",
        )
        .bind(uid)
        .bind(merged.to_string())
        .bind(self.clock.now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        tx.commit().await.map_err(conn)?;

        self.publish(Change::Progress(progress.user_id().clone()));
        Ok(())
    }
}
