use speakup_core::ProgressionRules;
use speakup_core::model::{Exercise, UserProgress};

use crate::error::ProgressError;

//
// ─── ANSWER FEEDBACK ───────────────────────────────────────────────────────────
//

/// Feedback for the exercise on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnswerState {
    /// Waiting for the user to pick an option.
    #[default]
    Idle,
    Correct {
        explanation: String,
    },
    Wrong {
        selected_index: usize,
        explanation: String,
    },
}

impl AnswerState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Coarse lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Active,
    Finished,
    Error,
}

/// Progress value to persist after a correct answer.
///
/// It has already been applied to the in-memory state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommit {
    pub progress: UserProgress,
    pub leveled_up: bool,
    /// Level label whose catalog must replace the live one, if it changed.
    /// The state has already dropped the old queue.
    pub resubscribe: Option<&'static str>,
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// In-memory session state. Every transition here is synchronous; the
/// engine owns subscriptions and persistence around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    loading: bool,
    failed: bool,
    progress: Option<UserProgress>,
    pending: Vec<Exercise>,
    total_in_level: usize,
    current_index: usize,
    answer: AnswerState,
    finished: bool,
    error_message: Option<String>,
    catalog_level: Option<&'static str>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loading: true,
            failed: false,
            progress: None,
            pending: Vec::new(),
            total_in_level: 0,
            current_index: 0,
            answer: AnswerState::Idle,
            finished: false,
            error_message: None,
            catalog_level: None,
        }
    }

    /// Point the catalog at a new level. The old queue belongs to another
    /// level, so it is dropped until that level's snapshot arrives.
    fn enter_level(&mut self, label: &'static str) {
        self.catalog_level = Some(label);
        self.loading = true;
        self.finished = false;
        self.pending.clear();
        self.total_in_level = 0;
        self.current_index = 0;
    }

    /// Drop completed ids from the queue and restart position and feedback.
    /// An empty catalog means nothing loaded yet, so it never counts as
    /// finished.
    fn rebuild_queue(&mut self) {
        if let Some(progress) = &self.progress {
            self.pending
                .retain(|exercise| !progress.has_completed(exercise.id()));
        }
        self.finished = self.total_in_level > 0 && self.pending.is_empty();
        self.current_index = 0;
        self.answer = AnswerState::Idle;
    }

    /// Replace progress with a pushed value and return the level label whose
    /// catalog must be subscribed again.
    ///
    /// Full-value replace: the queue is filtered against the new completed
    /// set straight away, so applying the same value twice leaves the same
    /// derived state. A different level drops the queue and waits for the new
    /// catalog.
    pub fn apply_progress(&mut self, progress: UserProgress) -> &'static str {
        let label = progress.level_label();
        self.progress = Some(progress);
        if self.catalog_level == Some(label) {
            self.rebuild_queue();
        } else {
            self.enter_level(label);
        }
        label
    }

    /// Ask for the current level's catalog again, even if it is live.
    pub fn reload_catalog(&mut self) -> Option<&'static str> {
        let label = self.progress.as_ref()?.level_label();
        self.catalog_level = Some(label);
        self.loading = true;
        Some(label)
    }

    /// Apply a catalog snapshot for `level`.
    ///
    /// Snapshots for any level other than the one currently targeted are
    /// stale and ignored. Position and feedback always restart.
    pub fn apply_catalog(&mut self, level: &str, exercises: Vec<Exercise>) -> bool {
        if self.catalog_level != Some(level) {
            return false;
        }

        self.loading = false;
        self.total_in_level = exercises.len();
        self.pending = exercises;
        self.rebuild_queue();
        true
    }

    /// Evaluate an answer for the current exercise.
    ///
    /// Ignored unless feedback is idle and an exercise is on screen. A correct
    /// answer updates progress optimistically and returns the value to
    /// persist; a wrong answer never touches progress.
    pub fn submit_answer(
        &mut self,
        selected_index: usize,
        rules: &ProgressionRules,
    ) -> Option<PendingCommit> {
        if !self.answer.is_idle() {
            return None;
        }
        let exercise = self.current_exercise()?;
        let explanation = exercise.explanation().to_owned();

        if !exercise.is_correct(selected_index) {
            self.answer = AnswerState::Wrong {
                selected_index,
                explanation,
            };
            return None;
        }

        let progress = self.progress.as_ref()?;
        let update = rules.apply_correct_answer(progress, exercise.id(), self.total_in_level);

        let label = update.progress.level_label();
        self.answer = AnswerState::Correct { explanation };
        self.progress = Some(update.progress.clone());
        let resubscribe = (self.catalog_level != Some(label)).then(|| {
            self.enter_level(label);
            label
        });

        Some(PendingCommit {
            progress: update.progress,
            leveled_up: update.leveled_up,
            resubscribe,
        })
    }

    /// Move to the next pending exercise, or finish after the last one.
    pub fn advance(&mut self) {
        if self.current_index + 1 < self.pending.len() {
            self.current_index += 1;
            self.answer = AnswerState::Idle;
        } else {
            self.finished = true;
        }
    }

    /// Replay the already-loaded queue from the start.
    pub fn restart(&mut self) {
        self.current_index = 0;
        self.answer = AnswerState::Idle;
        self.finished = false;
    }

    pub fn acknowledge_error(&mut self) {
        self.error_message = None;
    }

    /// Stop loading and enter the error phase.
    pub fn fail(&mut self, err: &ProgressError) {
        self.loading = false;
        self.failed = true;
        self.error_message = Some(err.user_message());
    }

    /// Show a message without leaving the current phase.
    pub fn report(&mut self, err: &ProgressError) {
        self.loading = false;
        self.error_message = Some(err.user_message());
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.failed {
            SessionPhase::Error
        } else if self.loading {
            SessionPhase::Loading
        } else if self.finished {
            SessionPhase::Finished
        } else {
            SessionPhase::Active
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn progress(&self) -> Option<&UserProgress> {
        self.progress.as_ref()
    }

    #[must_use]
    pub fn pending(&self) -> &[Exercise] {
        &self.pending
    }

    #[must_use]
    pub fn total_in_level(&self) -> usize {
        self.total_in_level
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.pending.get(self.current_index)
    }

    #[must_use]
    pub fn answer(&self) -> &AnswerState {
        &self.answer
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Level label the live catalog subscription serves.
    #[must_use]
    pub fn catalog_level(&self) -> Option<&'static str> {
        self.catalog_level
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
