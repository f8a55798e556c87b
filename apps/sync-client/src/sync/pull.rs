//! Pull: read remote tables for the signed-in user.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use study_core::RemoteSnapshot;

use super::SyncError;
use crate::remote::rows::{
    AchievementRow, BookmarkRow, DailyChallengeRow, FlashcardProgressRow, NoteRow, ProgressRow,
    QuizResultRow, RemoteRows, ReviewCardRow,
};
use crate::remote::{fetch, RemoteStore, Session, Table};

/// Result of one pull. Tables in `failed` contributed no data and must not
/// be pushed until a later pull of them succeeds.
#[derive(Debug, Default)]
pub struct PullOutcome {
    pub snapshot: RemoteSnapshot,
    pub failed: BTreeSet<Table>,
}

/// Read `table` only when it was requested.
async fn read<T: DeserializeOwned>(
    remote: &dyn RemoteStore,
    session: &Session,
    table: Table,
    wanted: &BTreeSet<Table>,
) -> Option<Result<Vec<T>, SyncError>> {
    if !wanted.contains(&table) {
        return None;
    }
    Some(fetch(remote, session, table).await)
}

/// A failed table read is logged and treated as an empty table, so the merge
/// keeps local data for it.
fn lenient<T>(
    table: Table,
    result: Option<Result<Vec<T>, SyncError>>,
    failed: &mut BTreeSet<Table>,
) -> Vec<T> {
    match result {
        Some(Ok(rows)) => rows,
        Some(Err(e)) => {
            tracing::warn!(table = %table, error = %e, "pull failed, keeping local data");
            failed.insert(table);
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Pull every table.
pub async fn pull_snapshot(remote: &dyn RemoteStore, session: &Session) -> PullOutcome {
    pull_tables(remote, session, &Table::ALL.into_iter().collect()).await
}

/// Issue one read per requested table concurrently and assemble the
/// snapshot. Tables not requested come back empty.
pub async fn pull_tables(
    remote: &dyn RemoteStore,
    session: &Session,
    tables: &BTreeSet<Table>,
) -> PullOutcome {
    let (
        progress,
        bookmarks,
        notes,
        achievements,
        daily_challenges,
        quiz_results,
        flashcard_progress,
        review_cards,
    ) = tokio::join!(
        read::<ProgressRow>(remote, session, Table::Progress, tables),
        read::<BookmarkRow>(remote, session, Table::Bookmarks, tables),
        read::<NoteRow>(remote, session, Table::Notes, tables),
        read::<AchievementRow>(remote, session, Table::Achievements, tables),
        read::<DailyChallengeRow>(remote, session, Table::DailyChallenges, tables),
        read::<QuizResultRow>(remote, session, Table::QuizResults, tables),
        read::<FlashcardProgressRow>(remote, session, Table::FlashcardProgress, tables),
        read::<ReviewCardRow>(remote, session, Table::ReviewCards, tables),
    );

    let mut failed = BTreeSet::new();
    let rows = RemoteRows {
        progress: lenient(Table::Progress, progress, &mut failed),
        bookmarks: lenient(Table::Bookmarks, bookmarks, &mut failed),
        notes: lenient(Table::Notes, notes, &mut failed),
        achievements: lenient(Table::Achievements, achievements, &mut failed),
        daily_challenges: lenient(Table::DailyChallenges, daily_challenges, &mut failed),
        quiz_results: lenient(Table::QuizResults, quiz_results, &mut failed),
        flashcard_progress: lenient(Table::FlashcardProgress, flashcard_progress, &mut failed),
        review_cards: lenient(Table::ReviewCards, review_cards, &mut failed),
    };

    PullOutcome {
        snapshot: rows.into_snapshot(),
        failed,
    }
}
