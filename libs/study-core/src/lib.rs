//! Core study-progress library shared by the client runtime.
//!
//! Provides:
//! - SM-2 spaced repetition scheduling for flashcards
//! - The local progress snapshot and its mutation operations
//! - The pull-merge policy applied when cloud data arrives
//! - Favorites diffing for the push path

pub mod algorithm;
pub mod diff;
pub mod error;
pub mod merge;
pub mod state;
pub mod types;

pub use algorithm::sm2::{compute_next_review, Sm2Outcome};
pub use diff::{diff_favorites, FavoritesDiff};
pub use error::{Result, StudyError};
pub use merge::{RemoteAchievement, RemoteProgress, RemoteSnapshot};
pub use state::{LocalAppState, PreferencesPatch};
pub use types::{
    DailyChallenge, FavoriteKind, Favorites, Preferences, Progress, Quality, QuizResult,
    ReviewCard,
};
