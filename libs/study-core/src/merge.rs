//! Pull-merge policy for data coming back from the cloud.
//!
//! Scalars are overwritten only by values the remote actually has. Collections
//! are replaced wholesale when the remote copy is non-empty and left alone
//! otherwise. Achievements are unioned by id.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};

use crate::state::LocalAppState;
use crate::types::{DailyChallenge, QuizResult, ReviewCard};

/// Scalar progress fields as stored remotely. `None` means the remote row
/// has no value for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteProgress {
    pub current_streak: Option<u32>,
    pub longest_streak: Option<u32>,
    pub last_study_date: Option<NaiveDate>,
    pub total_points: Option<u32>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub theme: Option<String>,
    pub dark_mode: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAchievement {
    pub id: String,
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Everything read from the remote tables for one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteSnapshot {
    pub progress: Option<RemoteProgress>,
    pub favorite_drugs: BTreeSet<String>,
    pub favorite_quizzes: BTreeSet<String>,
    pub notes: BTreeMap<String, String>,
    pub achievements: Vec<RemoteAchievement>,
    pub daily_challenges: BTreeMap<NaiveDate, DailyChallenge>,
    pub quiz_results: Vec<QuizResult>,
    pub known_cards: BTreeMap<String, BTreeSet<u32>>,
    pub review_cards: Vec<ReviewCard>,
}

fn fill<T>(slot: &mut T, remote: &Option<T>)
where
    T: Clone,
{
    if let Some(value) = remote {
        *slot = value.clone();
    }
}

fn replace_if_present<T>(slot: &mut T, remote: &T, is_empty: impl Fn(&T) -> bool)
where
    T: Clone,
{
    if !is_empty(remote) {
        *slot = remote.clone();
    }
}

impl LocalAppState {
    /// Merge a pulled snapshot into a copy of this state.
    ///
    /// Applying the same snapshot twice gives the same result as applying it
    /// once. An achievement already unlocked locally keeps the earliest known
    /// timestamp; one unknown locally takes the remote timestamp, or `now`
    /// when the remote row has none.
    pub fn merge_remote(&self, remote: &RemoteSnapshot, now: DateTime<Utc>) -> LocalAppState {
        let mut merged = self.clone();

        if let Some(p) = &remote.progress {
            fill(&mut merged.progress.current_streak, &p.current_streak);
            fill(&mut merged.progress.longest_streak, &p.longest_streak);
            if p.last_study_date.is_some() {
                merged.progress.last_study_date = p.last_study_date;
            }
            fill(&mut merged.progress.total_points, &p.total_points);
            fill(&mut merged.preferences.username, &p.username);
            if p.avatar.is_some() {
                merged.preferences.avatar = p.avatar.clone();
            }
            fill(&mut merged.preferences.theme, &p.theme);
            fill(&mut merged.preferences.dark_mode, &p.dark_mode);
        }

        replace_if_present(&mut merged.favorites.drugs, &remote.favorite_drugs, BTreeSet::is_empty);
        replace_if_present(
            &mut merged.favorites.quizzes,
            &remote.favorite_quizzes,
            BTreeSet::is_empty,
        );
        replace_if_present(&mut merged.notes, &remote.notes, BTreeMap::is_empty);
        replace_if_present(
            &mut merged.daily_challenges,
            &remote.daily_challenges,
            BTreeMap::is_empty,
        );
        replace_if_present(&mut merged.quiz_results, &remote.quiz_results, Vec::is_empty);
        replace_if_present(&mut merged.known_cards, &remote.known_cards, BTreeMap::is_empty);
        replace_if_present(&mut merged.review_cards, &remote.review_cards, Vec::is_empty);

        for achievement in &remote.achievements {
            let remote_at = achievement.unlocked_at;
            merged
                .achievements
                .entry(achievement.id.clone())
                .and_modify(|local_at| {
                    if let Some(at) = remote_at {
                        *local_at = (*local_at).min(at);
                    }
                })
                .or_insert_with(|| remote_at.unwrap_or(now));
        }

        merged
    }
}
