mod exercise;
mod ids;
mod level;
mod progress;

pub use exercise::{Exercise, ExerciseDraft, ExerciseError, ExerciseKind};
pub use ids::{ExerciseId, IdError, UserId};
pub use level::{LEVEL_LABELS, LevelTier};
pub use progress::UserProgress;
