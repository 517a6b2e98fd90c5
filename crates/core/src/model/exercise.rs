use serde::Serialize;
use thiserror::Error;

use crate::model::ids::ExerciseId;

//
// ─── EXERCISE KIND ─────────────────────────────────────────────────────────────
//

/// Variant tag of an exercise. Wire names are the upper snake case form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ExerciseKind {
    #[default]
    MultipleChoice,
    FillInTheBlank,
}

impl ExerciseKind {
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::MultipleChoice => "MULTIPLE_CHOICE",
            Self::FillInTheBlank => "FILL_IN_THE_BLANK",
        }
    }

    /// Parses a wire name. Unknown names map to `MultipleChoice`.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "FILL_IN_THE_BLANK" => Self::FillInTheBlank,
            _ => Self::MultipleChoice,
        }
    }
}

//
// ─── EXERCISE ──────────────────────────────────────────────────────────────────
//

/// Unvalidated exercise content, as authored or decoded from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseDraft {
    pub id: ExerciseId,
    pub level: String,
    pub kind: ExerciseKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    pub explanation: String,
}

impl ExerciseDraft {
    /// Validate the draft into a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::EmptyId` for a blank id, and
    /// `ExerciseError::AnswerOutOfRange` unless
    /// `correct_option_index < max(1, options.len())`.
    pub fn validate(self) -> Result<Exercise, ExerciseError> {
        if self.id.is_empty() {
            return Err(ExerciseError::EmptyId);
        }
        let bound = self.options.len().max(1);
        if self.correct_option_index >= bound {
            return Err(ExerciseError::AnswerOutOfRange {
                index: self.correct_option_index,
                options: self.options.len(),
            });
        }

        Ok(Exercise {
            id: self.id,
            level: self.level,
            kind: self.kind,
            prompt: self.prompt,
            options: self.options,
            correct_option_index: self.correct_option_index,
            explanation: self.explanation,
        })
    }
}

/// Immutable catalog entry. Read-only to the progress engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    id: ExerciseId,
    level: String,
    kind: ExerciseKind,
    prompt: String,
    options: Vec<String>,
    correct_option_index: usize,
    explanation: String,
}

impl Exercise {
    #[must_use]
    pub fn id(&self) -> &ExerciseId {
        &self.id
    }

    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }

    #[must_use]
    pub fn kind(&self) -> ExerciseKind {
        self.kind
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_option_index(&self) -> usize {
        self.correct_option_index
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Index comparison only; option text is never inspected.
    #[must_use]
    pub fn is_correct(&self, selected_index: usize) -> bool {
        selected_index == self.correct_option_index
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExerciseError {
    #[error("exercise id must not be empty")]
    EmptyId,

    #[error("correct answer index {index} out of range for {options} options")]
    AnswerOutOfRange { index: usize, options: usize },
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
