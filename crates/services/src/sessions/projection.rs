use speakup_core::model::{LevelTier, UserProgress};

use super::state::SessionState;

/// Derived numbers shared by every screen that shows session progress.
///
/// Always recomputed from state, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionProjection {
    pub level_label: &'static str,
    pub tier: LevelTier,
    pub completed_count: usize,
    pub total_in_level: usize,
    /// `completed / max(1, total)`, clamped to `0.0..=1.0`.
    pub level_progress_ratio: f64,
    /// Each completed exercise counts as one minute of practice.
    pub completed_minutes: u64,
    pub xp_points: u64,
}

impl SessionProjection {
    #[must_use]
    pub fn compute(progress: &UserProgress, total_in_level: usize) -> Self {
        let completed_count = progress.completed_count();
        let ratio = completed_count as f64 / total_in_level.max(1) as f64;

        Self {
            level_label: progress.level_label(),
            tier: progress.tier(),
            completed_count,
            total_in_level,
            level_progress_ratio: ratio.clamp(0.0, 1.0),
            completed_minutes: completed_count as u64,
            xp_points: progress.xp_points(),
        }
    }

    /// Projection of the session, or `None` before progress has loaded.
    #[must_use]
    pub fn from_state(state: &SessionState) -> Option<Self> {
        state
            .progress()
            .map(|progress| Self::compute(progress, state.total_in_level()))
    }

    /// Whole-number percentage for labels.
    #[must_use]
    pub fn percent(&self) -> u8 {
        (self.level_progress_ratio * 100.0).round() as u8
    }
}
