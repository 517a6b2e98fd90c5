mod engine;
mod identity;
mod projection;
mod state;
mod view;

// Public API of the session subsystem.
pub use crate::error::ProgressError;
pub use engine::ProgressEngine;
pub use identity::{IdentityProvider, StaticIdentity};
pub use projection::SessionProjection;
pub use state::{AnswerState, PendingCommit, SessionPhase, SessionState};
pub use view::{DashboardSummary, QuizView};
