use std::collections::BTreeSet;

use crate::model::ids::{ExerciseId, UserId};
use crate::model::level::LevelTier;

/// Per-user learning progress. One record per user in the store.
///
/// `completed` only holds exercises of the *current* tier; it is emptied
/// whenever the tier advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProgress {
    user_id: UserId,
    tier: LevelTier,
    xp_points: u64,
    completed: BTreeSet<ExerciseId>,
}

impl UserProgress {
    /// Progress for a user with no stored record yet.
    #[must_use]
    pub fn fresh(user_id: UserId) -> Self {
        Self {
            user_id,
            tier: LevelTier::FIRST,
            xp_points: 0,
            completed: BTreeSet::new(),
        }
    }

    /// Rehydrate progress from persisted fields. Duplicate ids collapse.
    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        tier: LevelTier,
        xp_points: u64,
        completed: impl IntoIterator<Item = ExerciseId>,
    ) -> Self {
        Self {
            user_id,
            tier,
            xp_points,
            completed: completed.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn tier(&self) -> LevelTier {
        self.tier
    }

    #[must_use]
    pub fn level_label(&self) -> &'static str {
        self.tier.label()
    }

    #[must_use]
    pub fn xp_points(&self) -> u64 {
        self.xp_points
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<ExerciseId> {
        &self.completed
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    #[must_use]
    pub fn has_completed(&self, id: &ExerciseId) -> bool {
        self.completed.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_progress_starts_at_first_tier() {
        let progress = UserProgress::fresh(UserId::new("u1"));
        assert_eq!(progress.tier(), LevelTier::FIRST);
        assert_eq!(progress.level_label(), "A1");
        assert_eq!(progress.xp_points(), 0);
        assert_eq!(progress.completed_count(), 0);
    }

    #[test]
    fn persisted_duplicates_collapse() {
        let progress = UserProgress::from_persisted(
            UserId::new("u1"),
            LevelTier::new(2),
            30,
            ["a2_001", "a2_001", "a2_002"].map(ExerciseId::new),
        );
        assert_eq!(progress.completed_count(), 2);
        assert!(progress.has_completed(&ExerciseId::new("a2_002")));
        assert_eq!(progress.level_label(), "A2");
    }
}
