//! Row shapes of the remote tables and their conversion to and from local
//! state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use study_core::{
    DailyChallenge, FavoriteKind, LocalAppState, QuizResult, RemoteAchievement, RemoteProgress,
    RemoteSnapshot, ReviewCard,
};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressRow {
    pub user_id: String,
    #[serde(default)]
    pub current_streak: Option<u32>,
    #[serde(default)]
    pub longest_streak: Option<u32>,
    #[serde(default)]
    pub last_study_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_points: Option<u32>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub dark_mode: Option<bool>,
}

impl ProgressRow {
    pub fn from_state(user_id: &str, state: &LocalAppState) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_streak: Some(state.progress.current_streak),
            longest_streak: Some(state.progress.longest_streak),
            last_study_date: state.progress.last_study_date,
            total_points: Some(state.progress.total_points),
            username: Some(state.preferences.username.clone()),
            avatar: state.preferences.avatar.clone(),
            theme: Some(state.preferences.theme.clone()),
            dark_mode: Some(state.preferences.dark_mode),
        }
    }

    fn into_remote(self) -> RemoteProgress {
        RemoteProgress {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_study_date: self.last_study_date,
            total_points: self.total_points,
            username: self.username,
            avatar: self.avatar,
            theme: self.theme,
            dark_mode: self.dark_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRow {
    pub user_id: String,
    pub item_type: String,
    pub item_id: String,
}

impl BookmarkRow {
    pub fn new(user_id: &str, kind: FavoriteKind, item_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            item_type: kind.as_str().to_string(),
            item_id: item_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRow {
    pub user_id: String,
    pub drug_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRow {
    pub user_id: String,
    pub achievement_id: String,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyChallengeRow {
    pub user_id: String,
    pub challenge_date: NaiveDate,
    pub score: u32,
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResultRow {
    pub id: Uuid,
    pub user_id: String,
    pub quiz_id: String,
    pub score: u32,
    pub total: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardProgressRow {
    pub user_id: String,
    pub content_id: String,
    pub known_indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCardRow {
    pub user_id: String,
    pub content_id: String,
    pub card_index: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub next_review_date: DateTime<Utc>,
    #[serde(default)]
    pub last_review_date: Option<DateTime<Utc>>,
}

/// Notes with text. Blank notes are never pushed.
pub fn note_rows(user_id: &str, state: &LocalAppState) -> Vec<NoteRow> {
    state
        .notes
        .iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(drug_id, text)| NoteRow {
            user_id: user_id.to_string(),
            drug_id: drug_id.clone(),
            content: text.clone(),
        })
        .collect()
}

pub fn achievement_rows(user_id: &str, state: &LocalAppState) -> Vec<AchievementRow> {
    state
        .achievements
        .iter()
        .map(|(id, at)| AchievementRow {
            user_id: user_id.to_string(),
            achievement_id: id.clone(),
            unlocked_at: Some(*at),
        })
        .collect()
}

/// Daily challenges are always pushed as completed.
pub fn daily_challenge_rows(user_id: &str, state: &LocalAppState) -> Vec<DailyChallengeRow> {
    state
        .daily_challenges
        .iter()
        .map(|(date, challenge)| DailyChallengeRow {
            user_id: user_id.to_string(),
            challenge_date: *date,
            score: challenge.score,
            completed: true,
            completed_at: challenge.completed_at,
        })
        .collect()
}

pub fn quiz_result_rows(user_id: &str, state: &LocalAppState) -> Vec<QuizResultRow> {
    state
        .quiz_results
        .iter()
        .map(|r| QuizResultRow {
            id: r.id,
            user_id: user_id.to_string(),
            quiz_id: r.quiz_id.clone(),
            score: r.score,
            total: r.total,
            completed_at: r.completed_at,
        })
        .collect()
}

/// One row per content id, including ids whose list was cleared.
pub fn flashcard_progress_rows(user_id: &str, state: &LocalAppState) -> Vec<FlashcardProgressRow> {
    state
        .known_cards
        .iter()
        .map(|(content_id, indices)| FlashcardProgressRow {
            user_id: user_id.to_string(),
            content_id: content_id.clone(),
            known_indices: indices.iter().copied().collect(),
        })
        .collect()
}

pub fn review_card_rows(user_id: &str, state: &LocalAppState) -> Vec<ReviewCardRow> {
    state
        .review_cards
        .iter()
        .map(|c| ReviewCardRow {
            user_id: user_id.to_string(),
            content_id: c.content_id.clone(),
            card_index: c.card_index,
            ease_factor: c.ease_factor,
            interval_days: c.interval_days,
            repetitions: c.repetitions,
            next_review_date: c.next_review_date,
            last_review_date: c.last_review_date,
        })
        .collect()
}

/// Group bookmark rows into per-kind id sets. Rows of unknown kind are skipped.
pub fn favorites_by_kind(rows: &[BookmarkRow]) -> BTreeMap<FavoriteKind, BTreeSet<String>> {
    let mut grouped: BTreeMap<FavoriteKind, BTreeSet<String>> = BTreeMap::new();
    for row in rows {
        match FavoriteKind::parse(&row.item_type) {
            Ok(kind) => {
                grouped.entry(kind).or_default().insert(row.item_id.clone());
            }
            Err(e) => tracing::warn!(item_id = %row.item_id, error = %e, "skipping bookmark row"),
        }
    }
    grouped
}

/// Rows pulled from every table for one user.
#[derive(Debug, Default)]
pub struct RemoteRows {
    pub progress: Vec<ProgressRow>,
    pub bookmarks: Vec<BookmarkRow>,
    pub notes: Vec<NoteRow>,
    pub achievements: Vec<AchievementRow>,
    pub daily_challenges: Vec<DailyChallengeRow>,
    pub quiz_results: Vec<QuizResultRow>,
    pub flashcard_progress: Vec<FlashcardProgressRow>,
    pub review_cards: Vec<ReviewCardRow>,
}

impl RemoteRows {
    pub fn into_snapshot(self) -> RemoteSnapshot {
        let mut favorites = favorites_by_kind(&self.bookmarks);

        RemoteSnapshot {
            progress: self.progress.into_iter().next().map(ProgressRow::into_remote),
            favorite_drugs: favorites.remove(&FavoriteKind::Drug).unwrap_or_default(),
            favorite_quizzes: favorites.remove(&FavoriteKind::Quiz).unwrap_or_default(),
            notes: self
                .notes
                .into_iter()
                .filter(|n| !n.content.trim().is_empty())
                .map(|n| (n.drug_id, n.content))
                .collect(),
            achievements: self
                .achievements
                .into_iter()
                .map(|a| RemoteAchievement {
                    id: a.achievement_id,
                    unlocked_at: a.unlocked_at,
                })
                .collect(),
            daily_challenges: self
                .daily_challenges
                .into_iter()
                .map(|d| {
                    (
                        d.challenge_date,
                        DailyChallenge {
                            score: d.score,
                            completed: d.completed,
                            completed_at: d.completed_at,
                        },
                    )
                })
                .collect(),
            quiz_results: self
                .quiz_results
                .into_iter()
                .map(|r| QuizResult {
                    id: r.id,
                    quiz_id: r.quiz_id,
                    score: r.score,
                    total: r.total,
                    completed_at: r.completed_at,
                })
                .collect(),
            known_cards: self
                .flashcard_progress
                .into_iter()
                .map(|f| (f.content_id, f.known_indices.into_iter().collect()))
                .collect(),
            review_cards: self
                .review_cards
                .into_iter()
                .map(|c| ReviewCard {
                    content_id: c.content_id,
                    card_index: c.card_index,
                    ease_factor: c.ease_factor.max(ReviewCard::MINIMUM_EASE),
                    interval_days: c.interval_days.max(1),
                    repetitions: c.repetitions,
                    next_review_date: c.next_review_date,
                    last_review_date: c.last_review_date,
                })
                .collect(),
        }
    }
}
