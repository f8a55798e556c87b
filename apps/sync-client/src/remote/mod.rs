//! Remote record store access.
//!
//! The cloud copy is a set of independent tables keyed by user id. The sync
//! coordinator only needs read-all-by-user, upsert-by-natural-key and
//! delete-by-natural-key per table, expressed here over JSON rows.

pub mod rest;
pub mod rows;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::sync::SyncError;

pub use rest::RestRemoteStore;

/// Authenticated user session handed over by the sign-in flow.
#[derive(Clone)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Remote tables, one per independently synced slice of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Progress,
    Bookmarks,
    Notes,
    Achievements,
    DailyChallenges,
    QuizResults,
    FlashcardProgress,
    ReviewCards,
}

impl Table {
    pub const ALL: [Table; 8] = [
        Table::Progress,
        Table::Bookmarks,
        Table::Notes,
        Table::Achievements,
        Table::DailyChallenges,
        Table::QuizResults,
        Table::FlashcardProgress,
        Table::ReviewCards,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress => "user_progress",
            Self::Bookmarks => "bookmarks",
            Self::Notes => "notes",
            Self::Achievements => "user_achievements",
            Self::DailyChallenges => "daily_challenges",
            Self::QuizResults => "quiz_results",
            Self::FlashcardProgress => "flashcard_progress",
            Self::ReviewCards => "review_cards",
        }
    }

    /// Comma-separated natural key used as the upsert conflict target.
    pub fn conflict_target(&self) -> &'static str {
        match self {
            Self::Progress => "user_id",
            Self::Bookmarks => "user_id,item_type,item_id",
            Self::Notes => "user_id,drug_id",
            Self::Achievements => "user_id,achievement_id",
            Self::DailyChallenges => "user_id,challenge_date",
            Self::QuizResults => "id",
            Self::FlashcardProgress => "user_id,content_id",
            Self::ReviewCards => "user_id,content_id,card_index",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Per-table access to the remote record store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All rows of `table` belonging to the session's user.
    async fn select(&self, session: &Session, table: Table) -> Result<Vec<Value>, SyncError>;

    /// Insert-or-update rows keyed by the table's natural key.
    async fn upsert(
        &self,
        session: &Session,
        table: Table,
        rows: Vec<Value>,
    ) -> Result<(), SyncError>;

    /// Delete the rows matching every `(column, value)` pair.
    async fn delete(
        &self,
        session: &Session,
        table: Table,
        filter: &[(&str, String)],
    ) -> Result<(), SyncError>;
}

/// Select and decode the user's rows of `table`.
pub async fn fetch<T>(
    remote: &dyn RemoteStore,
    session: &Session,
    table: Table,
) -> Result<Vec<T>, SyncError>
where
    T: DeserializeOwned,
{
    remote
        .select(session, table)
        .await?
        .into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| SyncError::Parse(format!("{table}: {e}")))
        })
        .collect()
}

/// Encode and upsert rows. Empty batches make no call.
pub async fn upsert_rows<T>(
    remote: &dyn RemoteStore,
    session: &Session,
    table: Table,
    rows: &[T],
) -> Result<(), SyncError>
where
    T: Serialize + Sync,
{
    if rows.is_empty() {
        return Ok(());
    }
    let values = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SyncError::Parse(format!("{table}: {e}")))?;
    remote.upsert(session, table, values).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_debug_hides_token() {
        let session = Session::new("user-1", "secret-token");
        let printed = format!("{session:?}");
        assert!(printed.contains("user-1"));
        assert!(!printed.contains("secret-token"));
    }

    #[test]
    fn every_conflict_target_is_scoped() {
        for table in Table::ALL {
            let target = table.conflict_target();
            assert!(
                target.starts_with("user_id") || table == Table::QuizResults,
                "{table} has target {target}"
            );
        }
    }
}
