//! Application state store.
//!
//! `AppStore` owns the current `LocalAppState` snapshot. Each update runs on a
//! private copy, is written to the blob store, and only then published as a
//! new immutable snapshot to subscribers such as the sync coordinator.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, Utc};
use study_core::{
    FavoriteKind, LocalAppState, PreferencesPatch, Quality, QuizResult, RemoteSnapshot, ReviewCard,
};
use tokio::sync::watch;

use crate::db::{BlobStore, DbError};

/// Blob key under which the whole state is stored.
pub const STATE_KEY: &str = "pharmacy_study_state";

type Result<T> = std::result::Result<T, DbError>;

struct AppStoreInner {
    repository: Mutex<Box<dyn BlobStore + Send>>,
    snapshot: watch::Sender<Arc<LocalAppState>>,
}

/// Shared handle to the application state. Cheap to clone.
#[derive(Clone)]
pub struct AppStore {
    inner: Arc<AppStoreInner>,
}

impl AppStore {
    /// Load the stored state, or start from defaults when nothing is stored.
    ///
    /// A blob that no longer parses is reported, not discarded.
    pub fn open<S>(repository: S) -> Result<Self>
    where
        S: BlobStore + Send + 'static,
    {
        let initial = match repository.read(STATE_KEY)? {
            Some(blob) => serde_json::from_str(&blob)?,
            None => LocalAppState::default(),
        };
        let (snapshot, _) = watch::channel(Arc::new(initial));

        Ok(Self {
            inner: Arc::new(AppStoreInner {
                repository: Mutex::new(Box::new(repository)),
                snapshot,
            }),
        })
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<LocalAppState> {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver notified with every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<LocalAppState>> {
        self.inner.snapshot.subscribe()
    }

    /// Apply `mutate` to a copy of the state, persist it, then publish it.
    ///
    /// Updates that leave the state unchanged are neither written nor
    /// published.
    pub fn update<T, F>(&self, mutate: F) -> Result<(Arc<LocalAppState>, T)>
    where
        F: FnOnce(&mut LocalAppState) -> T,
    {
        let repo = self
            .inner
            .repository
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let current = self.snapshot();
        let mut next = (*current).clone();
        let output = mutate(&mut next);
        if next == *current {
            return Ok((current, output));
        }

        let blob = serde_json::to_string(&next)?;
        repo.write(STATE_KEY, &blob)?;

        let next = Arc::new(next);
        self.inner.snapshot.send_replace(next.clone());
        tracing::debug!(bytes = blob.len(), "local state persisted");
        Ok((next, output))
    }

    /// Merge a pulled remote snapshot into the local state.
    pub fn merge_remote(
        &self,
        remote: &RemoteSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Arc<LocalAppState>> {
        let (snapshot, ()) = self.update(|state| *state = state.merge_remote(remote, now))?;
        Ok(snapshot)
    }

    pub fn toggle_favorite(&self, kind: FavoriteKind, id: &str) -> Result<bool> {
        Ok(self.update(|state| state.toggle_favorite(kind, id))?.1)
    }

    pub fn set_note(&self, drug_id: &str, text: &str) -> Result<()> {
        Ok(self.update(|state| state.set_note(drug_id, text))?.1)
    }

    /// Store a finished quiz and count today as a study day.
    pub fn record_quiz_result(&self, result: QuizResult) -> Result<()> {
        let today = Local::now().date_naive();
        self.update(|state| {
            state.record_quiz_result(result);
            state.record_study_day(today);
        })?;
        Ok(())
    }

    pub fn unlock_achievement(&self, id: &str) -> Result<bool> {
        Ok(self.update(|state| state.unlock_achievement(id, Utc::now()))?.1)
    }

    /// Record today's daily challenge. Returns false when today already has one.
    pub fn record_daily_challenge(&self, score: u32) -> Result<bool> {
        let today = Local::now().date_naive();
        Ok(self
            .update(|state| state.record_daily_challenge(today, score, Utc::now()))?
            .1)
    }

    pub fn set_card_known(&self, content_id: &str, index: u32, known: bool) -> Result<()> {
        Ok(self.update(|state| state.set_card_known(content_id, index, known))?.1)
    }

    /// Review a flashcard now and count today as a study day.
    pub fn review_card(
        &self,
        content_id: &str,
        index: u32,
        quality: Quality,
    ) -> Result<ReviewCard> {
        let now = Utc::now();
        let today = Local::now().date_naive();
        Ok(self
            .update(|state| {
                state.record_study_day(today);
                state.review_card(content_id, index, quality, now)
            })?
            .1)
    }

    pub fn add_points(&self, points: u32) -> Result<()> {
        Ok(self.update(|state| state.add_points(points))?.1)
    }

    pub fn update_preferences(&self, patch: PreferencesPatch) -> Result<()> {
        Ok(self.update(|state| state.update_preferences(patch))?.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteRepository;
    use pretty_assertions::assert_eq;

    fn store() -> AppStore {
        AppStore::open(SqliteRepository::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn starts_from_defaults() {
        let store = store();
        assert_eq!(*store.snapshot(), LocalAppState::default());
    }

    #[test]
    fn update_returns_new_snapshot_and_keeps_old_one_intact() {
        let store = store();
        let before = store.snapshot();
        store.toggle_favorite(FavoriteKind::Drug, "digoxin").unwrap();
        let after = store.snapshot();

        assert!(before.favorites.drugs.is_empty());
        assert!(after.favorites.drugs.contains("digoxin"));
    }

    #[test]
    fn updates_are_persisted_and_reloaded() {
        let path = std::env::temp_dir().join(format!("pharmacy-state-{}.db", uuid::Uuid::new_v4()));
        {
            let store = AppStore::open(SqliteRepository::open(&path).unwrap()).unwrap();
            store.set_note("heparin", "monitor aPTT").unwrap();
            store.toggle_favorite(FavoriteKind::Quiz, "anticoagulants").unwrap();
        }
        let reopened = AppStore::open(SqliteRepository::open(&path).unwrap()).unwrap();
        let state = reopened.snapshot();
        assert_eq!(state.notes["heparin"], "monitor aPTT");
        assert!(state.favorites.quizzes.contains("anticoagulants"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_blob_is_reported() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        repo.write(STATE_KEY, "not json").unwrap();
        assert!(matches!(AppStore::open(repo), Err(DbError::Serialization(_))));
    }

    #[test]
    fn unchanged_update_is_not_published() {
        let store = store();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.set_note("ibuprofen", "").unwrap();
        assert!(!rx.has_changed().unwrap());

        store.set_note("ibuprofen", "with food").unwrap();
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn review_card_persists_scheduler_output() {
        let store = store();
        let card = store.review_card("statins", 2, Quality::new(5).unwrap()).unwrap();
        assert_eq!(card.repetitions, 1);
        assert_eq!(store.snapshot().review_cards, vec![card]);
        assert_eq!(store.snapshot().progress.current_streak, 1);
    }
}
