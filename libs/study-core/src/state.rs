//! The local progress snapshot and its mutation operations.
//!
//! Every operation mutates in place and is meant to run against a private
//! clone; the client store publishes the result as a new immutable snapshot.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::algorithm::due_cards;
use crate::types::{
    DailyChallenge, FavoriteKind, Favorites, Preferences, Progress, Quality, QuizResult,
    ReviewCard,
};

/// Everything the app tracks for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalAppState {
    pub quiz_results: Vec<QuizResult>,
    pub achievements: BTreeMap<String, DateTime<Utc>>,
    pub progress: Progress,
    pub preferences: Preferences,
    pub favorites: Favorites,
    pub notes: BTreeMap<String, String>,
    pub daily_challenges: BTreeMap<NaiveDate, DailyChallenge>,
    pub known_cards: BTreeMap<String, BTreeSet<u32>>,
    pub review_cards: Vec<ReviewCard>,
}

/// Partial preferences update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesPatch {
    pub username: Option<String>,
    /// `Some(None)` clears the avatar.
    pub avatar: Option<Option<String>>,
    pub theme: Option<String>,
    pub dark_mode: Option<bool>,
}

impl LocalAppState {
    pub fn record_quiz_result(&mut self, result: QuizResult) {
        self.quiz_results.push(result);
    }

    /// Unlock an achievement. Returns false when it was already unlocked;
    /// the original timestamp is kept.
    pub fn unlock_achievement(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        if self.achievements.contains_key(id) {
            return false;
        }
        self.achievements.insert(id.to_string(), now);
        true
    }

    pub fn is_favorite(&self, kind: FavoriteKind, id: &str) -> bool {
        self.favorites.get(kind).contains(id)
    }

    /// Flip favorite membership. Returns the new membership.
    pub fn toggle_favorite(&mut self, kind: FavoriteKind, id: &str) -> bool {
        let set = self.favorites.get_mut(kind);
        if set.remove(id) {
            false
        } else {
            set.insert(id.to_string());
            true
        }
    }

    /// Set the note for a drug. Blank text removes the local note.
    pub fn set_note(&mut self, drug_id: &str, text: &str) {
        if text.trim().is_empty() {
            self.notes.remove(drug_id);
        } else {
            self.notes.insert(drug_id.to_string(), text.to_string());
        }
    }

    /// Record the daily challenge for `date`. Refused when that date already
    /// has a record.
    pub fn record_daily_challenge(
        &mut self,
        date: NaiveDate,
        score: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if self.daily_challenges.contains_key(&date) {
            return false;
        }
        self.daily_challenges.insert(
            date,
            DailyChallenge {
                score,
                completed: true,
                completed_at: Some(now),
            },
        );
        true
    }

    /// Mark or unmark a flashcard as known. A content id whose last index is
    /// unmarked keeps an empty list so the cleared state still syncs.
    pub fn set_card_known(&mut self, content_id: &str, index: u32, known: bool) {
        if known {
            self.known_cards
                .entry(content_id.to_string())
                .or_default()
                .insert(index);
        } else if let Some(indices) = self.known_cards.get_mut(content_id) {
            indices.remove(&index);
        }
    }

    pub fn is_card_known(&self, content_id: &str, index: u32) -> bool {
        self.known_cards
            .get(content_id)
            .is_some_and(|indices| indices.contains(&index))
    }

    pub fn review_card_state(&self, content_id: &str, index: u32) -> Option<&ReviewCard> {
        self.review_cards
            .iter()
            .find(|card| card.key() == (content_id, index))
    }

    /// Review a flashcard, creating its scheduling record on first review.
    pub fn review_card(
        &mut self,
        content_id: &str,
        index: u32,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> ReviewCard {
        match self
            .review_cards
            .iter_mut()
            .find(|card| card.key() == (content_id, index))
        {
            Some(card) => {
                *card = card.review(quality, now);
                card.clone()
            }
            None => {
                let card = ReviewCard::new(content_id, index, now).review(quality, now);
                self.review_cards.push(card.clone());
                card
            }
        }
    }

    pub fn due_cards(&self, now: DateTime<Utc>) -> Vec<&ReviewCard> {
        due_cards(&self.review_cards, now)
    }

    /// Count `date` as a study day and update the streak counters.
    pub fn record_study_day(&mut self, date: NaiveDate) {
        let progress = &mut self.progress;
        match progress.last_study_date {
            Some(last) if last == date => return,
            Some(last) if last.succ_opt() == Some(date) => progress.current_streak += 1,
            Some(last) if last > date => return,
            _ => progress.current_streak = 1,
        }
        progress.last_study_date = Some(date);
        progress.longest_streak = progress.longest_streak.max(progress.current_streak);
    }

    pub fn add_points(&mut self, points: u32) {
        self.progress.total_points = self.progress.total_points.saturating_add(points);
    }

    pub fn update_preferences(&mut self, patch: PreferencesPatch) {
        let prefs = &mut self.preferences;
        if let Some(username) = patch.username {
            prefs.username = username;
        }
        if let Some(avatar) = patch.avatar {
            prefs.avatar = avatar;
        }
        if let Some(theme) = patch.theme {
            prefs.theme = theme;
        }
        if let Some(dark_mode) = patch.dark_mode {
            prefs.dark_mode = dark_mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn toggle_favorite_adds_then_removes() {
        let mut state = LocalAppState::default();
        assert!(state.toggle_favorite(FavoriteKind::Drug, "lisinopril"));
        assert!(state.is_favorite(FavoriteKind::Drug, "lisinopril"));
        assert!(!state.is_favorite(FavoriteKind::Quiz, "lisinopril"));
        assert!(!state.toggle_favorite(FavoriteKind::Drug, "lisinopril"));
        assert!(state.favorites.drugs.is_empty());
    }

    #[test]
    fn achievement_timestamp_is_never_replaced() {
        let mut state = LocalAppState::default();
        let first = Utc::now();
        assert!(state.unlock_achievement("first_quiz", first));
        assert!(!state.unlock_achievement("first_quiz", first + Duration::days(1)));
        assert_eq!(state.achievements["first_quiz"], first);
    }

    #[test]
    fn one_daily_challenge_per_date() {
        let mut state = LocalAppState::default();
        let now = Utc::now();
        assert!(state.record_daily_challenge(date(2026, 3, 1), 80, now));
        assert!(!state.record_daily_challenge(date(2026, 3, 1), 100, now));
        assert_eq!(state.daily_challenges.len(), 1);
        assert_eq!(state.daily_challenges[&date(2026, 3, 1)].score, 80);
    }

    #[test]
    fn blank_note_removes_entry() {
        let mut state = LocalAppState::default();
        state.set_note("atorvastatin", "take at night");
        assert_eq!(state.notes["atorvastatin"], "take at night");
        state.set_note("atorvastatin", "   ");
        assert!(state.notes.is_empty());
    }

    #[test]
    fn unmarking_last_known_card_keeps_empty_list() {
        let mut state = LocalAppState::default();
        state.set_card_known("beta-blockers", 2, true);
        state.set_card_known("beta-blockers", 2, true);
        assert_eq!(state.known_cards["beta-blockers"].len(), 1);
        assert!(state.is_card_known("beta-blockers", 2));

        state.set_card_known("beta-blockers", 2, false);
        assert!(!state.is_card_known("beta-blockers", 2));
        assert!(state.known_cards["beta-blockers"].is_empty());

        state.set_card_known("statins", 0, false);
        assert!(!state.known_cards.contains_key("statins"));
    }

    #[test]
    fn review_card_creates_then_updates() {
        let mut state = LocalAppState::default();
        let now = Utc::now();
        let good = Quality::new(5).unwrap();

        let first = state.review_card("opioids", 0, good, now);
        assert_eq!(first.repetitions, 1);
        let second = state.review_card("opioids", 0, good, now);
        assert_eq!(second.repetitions, 2);
        assert_eq!(second.interval_days, 6);
        assert_eq!(state.review_cards.len(), 1);
        assert_eq!(state.review_card_state("opioids", 0), Some(&second));
        assert_eq!(state.review_card_state("opioids", 1), None);

        assert!(state.due_cards(now).is_empty());
        assert_eq!(state.due_cards(now + Duration::days(6)).len(), 1);
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let mut state = LocalAppState::default();
        state.record_study_day(date(2026, 1, 1));
        state.record_study_day(date(2026, 1, 2));
        state.record_study_day(date(2026, 1, 2));
        state.record_study_day(date(2026, 1, 3));
        assert_eq!(state.progress.current_streak, 3);
        assert_eq!(state.progress.longest_streak, 3);

        state.record_study_day(date(2026, 1, 7));
        assert_eq!(state.progress.current_streak, 1);
        assert_eq!(state.progress.longest_streak, 3);
        assert_eq!(state.progress.last_study_date, Some(date(2026, 1, 7)));
    }

    #[test]
    fn preferences_patch_only_touches_present_fields() {
        let mut state = LocalAppState::default();
        state.update_preferences(PreferencesPatch {
            theme: Some("ocean".into()),
            avatar: Some(Some("pill".into())),
            ..Default::default()
        });
        assert_eq!(state.preferences.theme, "ocean");
        assert_eq!(state.preferences.avatar.as_deref(), Some("pill"));
        assert_eq!(state.preferences.username, "Student");

        state.update_preferences(PreferencesPatch {
            avatar: Some(None),
            ..Default::default()
        });
        assert_eq!(state.preferences.avatar, None);
    }

    #[test]
    fn serde_round_trip_preserves_state() {
        let now = Utc::now();
        let mut state = LocalAppState::default();
        state.toggle_favorite(FavoriteKind::Drug, "b");
        state.toggle_favorite(FavoriteKind::Drug, "a");
        state.toggle_favorite(FavoriteKind::Quiz, "cardio-1");
        state.set_note("a", "loading dose");
        state.record_daily_challenge(date(2026, 5, 4), 7, now);
        state.set_card_known("antibiotics", 4, true);
        state.review_card("antibiotics", 4, Quality::new(4).unwrap(), now);
        state.record_quiz_result(QuizResult::new("cardio-1", 8, 10, now));
        state.unlock_achievement("streak_3", now);

        let blob = serde_json::to_string(&state).unwrap();
        let restored: LocalAppState = serde_json::from_str(&blob).unwrap();
        assert_eq!(restored, state);

        let expected: BTreeSet<String> = ["a", "b"].into_iter().map(String::from).collect();
        assert_eq!(restored.favorites.drugs, expected);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let restored: LocalAppState =
            serde_json::from_str(r#"{"notes":{"x":"y"}}"#).unwrap();
        assert_eq!(restored.notes["x"], "y");
        assert_eq!(restored.preferences, Preferences::default());
        assert!(restored.review_cards.is_empty());
    }
}
