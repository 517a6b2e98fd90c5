//! Field-level document shapes shared by every store backend.
//!
//! Exercise: `{id, level, type, question, options, correctAnswerIndex, explanation}`
//! UserProgress: `{uid, currentLevel, xpPoints, completedExercises}`
//!
//! Decoding is permissive: missing or mistyped fields take their defaults.
//! Only documents that cannot form a valid value are rejected.

use serde::Serialize;
use serde_json::{Map, Value};
use speakup_core::model::{
    Exercise, ExerciseDraft, ExerciseError, ExerciseId, ExerciseKind, LEVEL_LABELS, LevelTier,
    UserId, UserProgress,
};
use thiserror::Error;

use crate::repository::StorageError;

pub const EXERCISES: &str = "exercises";
pub const USER_PROGRESS: &str = "userProgress";

/// A single document that cannot be turned into a domain value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DocumentError {
    #[error("document is not an object")]
    NotAnObject,

    #[error("document has no id")]
    MissingId,

    #[error("field {field} is out of range")]
    OutOfRange { field: &'static str },

    #[error(transparent)]
    Exercise(#[from] ExerciseError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExerciseDocument<'a> {
    id: &'a str,
    level: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    question: &'a str,
    options: &'a [String],
    correct_answer_index: usize,
    explanation: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressDocument<'a> {
    uid: &'a str,
    current_level: u32,
    xp_points: u64,
    completed_exercises: Vec<&'a str>,
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Encode an exercise into its document shape.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the value cannot be encoded.
pub fn encode_exercise(exercise: &Exercise) -> Result<Value, StorageError> {
    serde_json::to_value(ExerciseDocument {
        id: exercise.id().as_str(),
        level: exercise.level(),
        kind: exercise.kind().wire_name(),
        question: exercise.prompt(),
        options: exercise.options(),
        correct_answer_index: exercise.correct_option_index(),
        explanation: exercise.explanation(),
    })
    .map_err(ser)
}

/// Encode progress into its document shape. Completed ids are written sorted.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the value cannot be encoded.
pub fn encode_progress(progress: &UserProgress) -> Result<Value, StorageError> {
    serde_json::to_value(ProgressDocument {
        uid: progress.user_id().as_str(),
        current_level: progress.tier().value(),
        xp_points: progress.xp_points(),
        completed_exercises: progress.completed().iter().map(ExerciseId::as_str).collect(),
    })
    .map_err(ser)
}

/// Decode an exercise document stored under `key`.
///
/// The store key wins over the `id` field.
///
/// # Errors
///
/// Returns `DocumentError` when the document cannot form a valid exercise.
pub fn decode_exercise(key: &str, doc: &Value) -> Result<Exercise, DocumentError> {
    let fields = doc.as_object().ok_or(DocumentError::NotAnObject)?;

    let id = non_empty(key)
        .or_else(|| str_field(fields, "id").and_then(non_empty))
        .ok_or(DocumentError::MissingId)?;

    let correct_option_index = match fields.get("correctAnswerIndex") {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or(DocumentError::OutOfRange {
                field: "correctAnswerIndex",
            })?,
        _ => 0,
    };

    let draft = ExerciseDraft {
        id: ExerciseId::new(id),
        level: str_field(fields, "level").unwrap_or(LEVEL_LABELS[0]).to_owned(),
        kind: str_field(fields, "type").map_or(ExerciseKind::MultipleChoice, ExerciseKind::from_wire),
        prompt: str_field(fields, "question").unwrap_or_default().to_owned(),
        options: string_list(fields, "options"),
        correct_option_index,
        explanation: str_field(fields, "explanation").unwrap_or_default().to_owned(),
    };
    Ok(draft.validate()?)
}

/// Decode a progress document stored under `key`.
///
/// # Errors
///
/// Returns `DocumentError` when neither the `uid` field nor the key names a user.
pub fn decode_progress(key: &str, doc: &Value) -> Result<UserProgress, DocumentError> {
    let fields = doc.as_object().ok_or(DocumentError::NotAnObject)?;

    let uid = str_field(fields, "uid")
        .and_then(non_empty)
        .or_else(|| non_empty(key))
        .ok_or(DocumentError::MissingId)?;

    let tier = fields
        .get("currentLevel")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .map_or(LevelTier::FIRST, LevelTier::new);
    let xp_points = fields.get("xpPoints").and_then(Value::as_u64).unwrap_or(0);
    let completed = string_list(fields, "completedExercises")
        .into_iter()
        .filter(|id| !id.trim().is_empty())
        .map(ExerciseId::new);

    Ok(UserProgress::from_persisted(
        UserId::new(uid),
        tier,
        xp_points,
        completed,
    ))
}

/// Overlay `incoming` onto `existing` field by field.
///
/// Fields the incoming document does not carry are kept.
#[must_use]
pub fn merge(existing: Option<Value>, incoming: Value) -> Value {
    match (existing, incoming) {
        (Some(Value::Object(mut base)), Value::Object(update)) => {
            for (field, value) in update {
                base.insert(field, value);
            }
            Value::Object(base)
        }
        (_, incoming) => incoming,
    }
}

/// Blank ids are missing; anything else is kept verbatim.
fn non_empty(s: &str) -> Option<&str> {
    (!s.trim().is_empty()).then_some(s)
}

fn str_field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    fields.get(name).and_then(Value::as_str)
}

fn string_list(fields: &Map<String, Value>, name: &str) -> Vec<String> {
    fields
        .get(name)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_exercise() -> Exercise {
        sample_draft("a1_005").validate().unwrap()
    }

    fn sample_draft(id: &str) -> ExerciseDraft {
        ExerciseDraft {
            id: ExerciseId::new(id),
            level: "A1".into(),
            kind: ExerciseKind::FillInTheBlank,
            prompt: "Please ___ down.".into(),
            options: vec!["sit".into(), "sat".into(), "sits".into(), "sitting".into()],
            correct_option_index: 0,
            explanation: "After 'please', use the base form.".into(),
        }
    }

    #[test]
    fn exercise_document_uses_wire_field_names() {
        let doc = encode_exercise(&sample_exercise()).unwrap();
        assert_eq!(doc["type"], "FILL_IN_THE_BLANK");
        assert_eq!(doc["question"], "Please ___ down.");
        assert_eq!(doc["correctAnswerIndex"], 0);
        assert_eq!(doc["options"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn exercise_round_trips() {
        let exercise = sample_exercise();
        let doc = encode_exercise(&exercise).unwrap();
        assert_eq!(decode_exercise("a1_005", &doc).unwrap(), exercise);
    }

    #[test]
    fn progress_round_trips() {
        let progress = UserProgress::from_persisted(
            UserId::new("uid-1"),
            LevelTier::new(3),
            120,
            ["b1_002", "b1_001"].map(ExerciseId::new),
        );
        let doc = encode_progress(&progress).unwrap();
        assert_eq!(doc["completedExercises"], json!(["b1_001", "b1_002"]));
        assert_eq!(decode_progress("uid-1", &doc).unwrap(), progress);
    }

    #[test]
    fn ids_are_not_trimmed_on_decode() {
        let exercise = sample_draft(" a1_005 ").validate().unwrap();
        let doc = encode_exercise(&exercise).unwrap();
        let decoded = decode_exercise(exercise.id().as_str(), &doc).unwrap();
        assert_eq!(decoded.id().as_str(), " a1_005 ");

        let progress = UserProgress::fresh(UserId::new(" uid-1"));
        let doc = encode_progress(&progress).unwrap();
        assert_eq!(decode_progress("other", &doc).unwrap(), progress);
    }

    #[test]
    fn exercise_defaults_are_permissive() {
        let doc = json!({ "type": "WORD_ORDER", "question": "Q", "options": ["a", 3, "b"] });
        let exercise = decode_exercise("ex1", &doc).unwrap();

        assert_eq!(exercise.kind(), ExerciseKind::MultipleChoice);
        assert_eq!(exercise.level(), "A1");
        assert_eq!(exercise.options(), ["a".to_string(), "b".to_string()]);
        assert_eq!(exercise.correct_option_index(), 0);
        assert_eq!(exercise.explanation(), "");
    }

    #[test]
    fn missing_options_decode_as_empty() {
        let exercise = decode_exercise("ex1", &json!({ "level": "A2" })).unwrap();
        assert!(exercise.options().is_empty());
    }

    #[test]
    fn out_of_range_answer_is_malformed() {
        let doc = json!({ "options": ["a", "b"], "correctAnswerIndex": 5 });
        assert!(matches!(
            decode_exercise("ex1", &doc),
            Err(DocumentError::Exercise(_))
        ));
        let doc = json!({ "options": ["a"], "correctAnswerIndex": -1 });
        assert_eq!(
            decode_exercise("ex1", &doc).unwrap_err(),
            DocumentError::OutOfRange {
                field: "correctAnswerIndex"
            }
        );
    }

    #[test]
    fn non_object_or_unkeyed_documents_are_malformed() {
        assert_eq!(
            decode_exercise("ex1", &json!([1, 2])).unwrap_err(),
            DocumentError::NotAnObject
        );
        assert_eq!(
            decode_exercise("", &json!({})).unwrap_err(),
            DocumentError::MissingId
        );
    }

    #[test]
    fn progress_defaults_are_permissive() {
        let progress = decode_progress("uid-9", &json!({ "completedExercises": ["a", 1, "a"] })).unwrap();

        assert_eq!(progress.user_id().as_str(), "uid-9");
        assert_eq!(progress.tier(), LevelTier::FIRST);
        assert_eq!(progress.xp_points(), 0);
        assert_eq!(progress.completed_count(), 1);
    }

    #[test]
    fn negative_level_falls_back_to_first_tier() {
        let progress = decode_progress("u", &json!({ "currentLevel": -3, "xpPoints": "lots" })).unwrap();
        assert_eq!(progress.tier(), LevelTier::FIRST);
        assert_eq!(progress.xp_points(), 0);
    }

    #[test]
    fn merge_keeps_foreign_fields() {
        let existing = json!({ "uid": "u", "xpPoints": 10, "displayName": "Ana" });
        let merged = merge(Some(existing), json!({ "uid": "u", "xpPoints": 20 }));
        assert_eq!(merged, json!({ "uid": "u", "xpPoints": 20, "displayName": "Ana" }));
    }

    #[test]
    fn merge_without_prior_document_creates_it() {
        let merged = merge(None, json!({ "uid": "u" }));
        assert_eq!(merged, json!({ "uid": "u" }));
    }
}
