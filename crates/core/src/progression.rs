use thiserror::Error;

use crate::model::{ExerciseId, UserProgress};

/// XP awarded for every correct answer.
pub const XP_PER_CORRECT: u64 = 10;

/// Fraction of a level's exercises that must be completed to advance a tier.
pub const LEVEL_UP_THRESHOLD: f64 = 0.80;

/// Threshold resolution. Ratios are compared as integers scaled by this.
const BASIS_POINTS: u64 = 10_000;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("level-up threshold must be in (0, 1], got {provided}")]
    InvalidThreshold { provided: f64 },
}

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

/// Result of crediting a correct answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub progress: UserProgress,
    pub leveled_up: bool,
}

/// XP and level-up rule applied on every correct answer.
///
/// ```
/// # use speakup_core::ProgressionRules;
/// let rules = ProgressionRules::default();
/// assert!(rules.reaches_level_up(4, 5));
/// assert!(!rules.reaches_level_up(3, 5));
/// assert!(!rules.reaches_level_up(0, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressionRules {
    xp_per_correct: u64,
    threshold_bp: u64,
}

impl Default for ProgressionRules {
    fn default() -> Self {
        Self {
            xp_per_correct: XP_PER_CORRECT,
            threshold_bp: 8_000,
        }
    }
}

impl ProgressionRules {
    /// Build rules with a custom XP award and level-up threshold.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::InvalidThreshold` unless `0 < threshold <= 1`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(xp_per_correct: u64, threshold: f64) -> Result<Self, ProgressionError> {
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(ProgressionError::InvalidThreshold {
                provided: threshold,
            });
        }
        let threshold_bp = (threshold * BASIS_POINTS as f64).round() as u64;
        Ok(Self {
            xp_per_correct,
            threshold_bp: threshold_bp.max(1),
        })
    }

    #[must_use]
    pub fn xp_per_correct(&self) -> u64 {
        self.xp_per_correct
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn threshold(&self) -> f64 {
        self.threshold_bp as f64 / BASIS_POINTS as f64
    }

    /// `completed / total >= threshold`, never true for an empty level.
    #[must_use]
    pub fn reaches_level_up(&self, completed: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        let lhs = completed as u128 * u128::from(BASIS_POINTS);
        let rhs = u128::from(self.threshold_bp) * total as u128;
        lhs >= rhs
    }

    /// Credit a correct answer for `exercise_id`.
    ///
    /// The completed set is a union, so a repeated id does not grow it, but
    /// XP is awarded on every call. Callers guard against double submission.
    /// On level-up the tier advances by exactly one and the completed set is
    /// emptied.
    #[must_use]
    pub fn apply_correct_answer(
        &self,
        progress: &UserProgress,
        exercise_id: &ExerciseId,
        total_in_level: usize,
    ) -> ProgressUpdate {
        let mut completed = progress.completed().clone();
        completed.insert(exercise_id.clone());
        let xp_points = progress.xp_points().saturating_add(self.xp_per_correct);

        let leveled_up = self.reaches_level_up(completed.len(), total_in_level);
        let (tier, completed) = if leveled_up {
            (progress.tier().next(), Default::default())
        } else {
            (progress.tier(), completed)
        };

        ProgressUpdate {
            progress: UserProgress::from_persisted(
                progress.user_id().clone(),
                tier,
                xp_points,
                completed,
            ),
            leveled_up,
        }
    }
}
