//! Core types for study progress.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StudyError};

/// Self-assessed recall score on a 0-5 scale.
///
/// 0-2 is a failed recall, 3-5 a successful one in ascending confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;

    /// Build a quality rating, rejecting anything above 5.
    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(StudyError::InvalidQuality(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether this rating counts as a successful recall.
    pub fn is_success(self) -> bool {
        self.0 >= 3
    }
}

impl TryFrom<u8> for Quality {
    type Error = StudyError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Scheduling state of one flashcard, identified by `(content_id, card_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCard {
    pub content_id: String,
    pub card_index: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub next_review_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review_date: Option<DateTime<Utc>>,
}

impl ReviewCard {
    pub const INITIAL_EASE: f64 = 2.5;
    pub const MINIMUM_EASE: f64 = 1.3;

    /// A never-reviewed card, due immediately.
    pub fn new(content_id: impl Into<String>, card_index: u32, now: DateTime<Utc>) -> Self {
        Self {
            content_id: content_id.into(),
            card_index,
            ease_factor: Self::INITIAL_EASE,
            interval_days: 1,
            repetitions: 0,
            next_review_date: now,
            last_review_date: None,
        }
    }

    pub fn key(&self) -> (&str, u32) {
        (&self.content_id, self.card_index)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date <= now
    }
}

/// One finished quiz attempt. The list of results is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: Uuid,
    pub quiz_id: String,
    pub score: u32,
    pub total: u32,
    pub completed_at: DateTime<Utc>,
}

impl QuizResult {
    pub fn new(
        quiz_id: impl Into<String>,
        score: u32,
        total: u32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            quiz_id: quiz_id.into(),
            score,
            total,
            completed_at,
        }
    }
}

/// Daily challenge record. Keyed by calendar date in the local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyChallenge {
    pub score: u32,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Which favorite set an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteKind {
    Drug,
    Quiz,
}

impl FavoriteKind {
    pub const ALL: [FavoriteKind; 2] = [FavoriteKind::Drug, FavoriteKind::Quiz];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drug => "drug",
            Self::Quiz => "quiz",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "drug" => Ok(Self::Drug),
            "quiz" => Ok(Self::Quiz),
            other => Err(StudyError::UnknownFavoriteKind(other.to_string())),
        }
    }
}

/// Favorite drug and quiz ids. Order is irrelevant and ids never repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorites {
    #[serde(default)]
    pub drugs: BTreeSet<String>,
    #[serde(default)]
    pub quizzes: BTreeSet<String>,
}

impl Favorites {
    pub fn get(&self, kind: FavoriteKind) -> &BTreeSet<String> {
        match kind {
            FavoriteKind::Drug => &self.drugs,
            FavoriteKind::Quiz => &self.quizzes,
        }
    }

    pub fn get_mut(&mut self, kind: FavoriteKind) -> &mut BTreeSet<String> {
        match kind {
            FavoriteKind::Drug => &mut self.drugs,
            FavoriteKind::Quiz => &mut self.quizzes,
        }
    }
}

/// Streak counters and points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_study_date: Option<NaiveDate>,
    pub total_points: u32,
}

/// User-facing preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub theme: String,
    pub dark_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            username: "Student".to_string(),
            avatar: None,
            theme: "default".to_string(),
            dark_mode: false,
        }
    }
}
