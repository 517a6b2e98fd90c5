use serde::Serialize;
use speakup_core::model::{Exercise, LevelTier};

use super::projection::SessionProjection;
use super::state::{AnswerState, SessionPhase, SessionState};

/// Presentation-agnostic data for the dashboard screen.
///
/// No pre-formatted strings beyond the level label; the UI decides layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub xp_points: u64,
    pub tier: LevelTier,
    pub level_label: &'static str,
    pub level_progress_ratio: f64,
    pub completed_minutes: u64,
    /// Denominator for the minutes display, never zero.
    pub total_minutes: u64,
}

impl DashboardSummary {
    #[must_use]
    pub fn from_projection(projection: &SessionProjection) -> Self {
        Self {
            xp_points: projection.xp_points,
            tier: projection.tier,
            level_label: projection.level_label,
            level_progress_ratio: projection.level_progress_ratio,
            completed_minutes: projection.completed_minutes,
            total_minutes: projection.total_in_level.max(1) as u64,
        }
    }

    #[must_use]
    pub fn from_state(state: &SessionState) -> Option<Self> {
        SessionProjection::from_state(state).map(|p| Self::from_projection(&p))
    }
}

/// Data for the quiz screen: the exercise on screen plus the same level
/// numbers the dashboard shows.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizView {
    pub phase: SessionPhase,
    pub projection: Option<SessionProjection>,
    pub exercise: Option<Exercise>,
    pub answer: AnswerState,
    /// 1-based position in the pending queue.
    pub position: usize,
    pub pending_total: usize,
    pub position_ratio: f64,
    pub error_message: Option<String>,
}

impl QuizView {
    #[must_use]
    pub fn from_state(state: &SessionState) -> Self {
        let pending_total = state.pending().len();
        let position = if pending_total == 0 {
            0
        } else {
            state.current_index() + 1
        };
        let position_ratio = if pending_total == 0 {
            0.0
        } else {
            position as f64 / pending_total as f64
        };

        Self {
            phase: state.phase(),
            projection: SessionProjection::from_state(state),
            exercise: state.current_exercise().cloned(),
            answer: state.answer().clone(),
            position,
            pending_total,
            position_ratio,
            error_message: state.error_message().map(str::to_owned),
        }
    }

    #[must_use]
    pub fn level_label(&self) -> &'static str {
        self.projection
            .as_ref()
            .map_or(LevelTier::FIRST.label(), |p| p.level_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speakup_core::ProgressionRules;
    use speakup_core::model::{ExerciseDraft, ExerciseId, ExerciseKind, UserId, UserProgress};

    fn exercise(id: &str) -> Exercise {
        ExerciseDraft {
            id: ExerciseId::new(id),
            level: "A1".into(),
            kind: ExerciseKind::FillInTheBlank,
            prompt: "Please ___ down.".into(),
            options: vec!["sit".into(), "sat".into()],
            correct_option_index: 0,
            explanation: "Base form after please.".into(),
        }
        .validate()
        .unwrap()
    }

    fn active_state() -> SessionState {
        let mut state = SessionState::new();
        let _ = state.apply_progress(UserProgress::fresh(UserId::new("u1")));
        state.apply_catalog("A1", vec![exercise("a"), exercise("b"), exercise("c")]);
        state
    }

    #[test]
    fn dashboard_and_quiz_share_numbers() {
        let mut state = active_state();
        let _ = state.submit_answer(0, &ProgressionRules::default());

        let dashboard = DashboardSummary::from_state(&state).unwrap();
        let quiz = QuizView::from_state(&state);
        let projection = quiz.projection.unwrap();

        assert_eq!(dashboard.level_progress_ratio, projection.level_progress_ratio);
        assert_eq!(dashboard.completed_minutes, 1);
        assert_eq!(dashboard.total_minutes, 3);
        assert_eq!(dashboard.xp_points, projection.xp_points);
        assert_eq!(dashboard.level_label, projection.level_label);
    }

    #[test]
    fn quiz_position_counts_from_one() {
        let mut state = active_state();
        state.advance();
        let quiz = QuizView::from_state(&state);
        assert_eq!(quiz.position, 2);
        assert_eq!(quiz.pending_total, 3);
        assert!((quiz.position_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(quiz.exercise.unwrap().id().as_str(), "b");
    }

    #[test]
    fn dashboard_minutes_denominator_is_never_zero() {
        let mut state = SessionState::new();
        let _ = state.apply_progress(UserProgress::fresh(UserId::new("u1")));
        state.apply_catalog("A1", Vec::new());
        assert_eq!(DashboardSummary::from_state(&state).unwrap().total_minutes, 1);
        assert_eq!(QuizView::from_state(&state).position, 0);
    }

    #[test]
    fn dashboard_serializes_camel_case() {
        let state = active_state();
        let value = serde_json::to_value(DashboardSummary::from_state(&state).unwrap()).unwrap();
        assert_eq!(value["levelLabel"], "A1");
        assert_eq!(value["tier"], 1);
        assert_eq!(value["totalMinutes"], 3);
    }

    #[test]
    fn loading_quiz_defaults_to_first_label() {
        let quiz = QuizView::from_state(&SessionState::new());
        assert_eq!(quiz.phase, SessionPhase::Loading);
        assert_eq!(quiz.level_label(), "A1");
    }
}
