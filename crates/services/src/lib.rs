#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod sessions;

pub use speakup_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ProgressError};

pub use sessions::{
    AnswerState, DashboardSummary, IdentityProvider, ProgressEngine, QuizView, SessionPhase,
    SessionProjection, SessionState, StaticIdentity,
};
