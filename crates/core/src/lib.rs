#![forbid(unsafe_code)]

pub mod model;
pub mod progression;
pub mod time;

pub use progression::{LEVEL_UP_THRESHOLD, ProgressUpdate, ProgressionRules, XP_PER_CORRECT};
pub use time::Clock;
