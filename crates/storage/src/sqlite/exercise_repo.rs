use speakup_core::model::Exercise;
use sqlx::SqlitePool;

use super::mapping::{conn, map_exercise_row};
use super::{Change, SqliteStore};
use crate::document;
use crate::repository::StorageError;

/// Exercises for a level in catalog (id) order, skipping malformed rows.
pub(crate) async fn load_level(pool: &SqlitePool, level: &str) -> Result<Vec<Exercise>, StorageError> {
    let rows = sqlx::query(
        r"
        SELECT id, body FROM exercises
        WHERE level = ?1
        ORDER BY id
        ",
    )
    .bind(level)
    .fetch_all(pool)
    .await
    .map_err(conn)?;

    let mut exercises = Vec::with_capacity(rows.len());
    for row in &rows {
        if let Some(exercise) = map_exercise_row(row)? {
            exercises.push(exercise);
        }
    }
    Ok(exercises)
}

impl SqliteStore {
    /// Upsert all exercises in one transaction.
    pub(crate) async fn write_exercises(&self, exercises: &[Exercise]) -> Result<(), StorageError> {
        let docs = exercises
            .iter()
            .map(|exercise| document::encode_exercise(exercise).map(|doc| (exercise, doc)))
            .collect::<Result<Vec<_>, _>>()?;
        let now = self.clock.now();

        let mut tx = self.pool.begin().await.map_err(conn)?;
        for (exercise, doc) in docs {
            sqlx::query(
                r"
                INSERT INTO exercises (id, level, body, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    level = excluded.level,
                    body = excluded.body,
                    updated_at = excluded.updated_at
                ",
            )
            .bind(exercise.id().as_str())
            .bind(exercise.level())
            .bind(doc.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }
        tx.commit().await.map_err(conn)?;

        self.publish(Change::Exercises);
        Ok(())
    }
}
