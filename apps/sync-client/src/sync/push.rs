//! Push: write one table's slice of the current local state.

use study_core::{diff_favorites, FavoriteKind, LocalAppState};

use super::SyncError;
use crate::remote::rows::{
    achievement_rows, daily_challenge_rows, favorites_by_kind, flashcard_progress_rows, note_rows,
    quiz_result_rows, review_card_rows, BookmarkRow, ProgressRow,
};
use crate::remote::{fetch, upsert_rows, RemoteStore, Session, Table};

/// Push `table` from `state`. Every write is keyed by the table's natural key,
/// so repeating a push is harmless.
pub async fn push_table(
    remote: &dyn RemoteStore,
    session: &Session,
    table: Table,
    state: &LocalAppState,
) -> Result<(), SyncError> {
    let user = session.user_id.as_str();
    match table {
        Table::Progress => {
            let row = ProgressRow::from_state(user, state);
            upsert_rows(remote, session, table, &[row]).await
        }
        Table::Bookmarks => push_bookmarks(remote, session, state).await,
        Table::Notes => upsert_rows(remote, session, table, &note_rows(user, state)).await,
        Table::Achievements => {
            upsert_rows(remote, session, table, &achievement_rows(user, state)).await
        }
        Table::DailyChallenges => {
            upsert_rows(remote, session, table, &daily_challenge_rows(user, state)).await
        }
        Table::QuizResults => {
            upsert_rows(remote, session, table, &quiz_result_rows(user, state)).await
        }
        Table::FlashcardProgress => {
            upsert_rows(remote, session, table, &flashcard_progress_rows(user, state)).await
        }
        Table::ReviewCards => {
            upsert_rows(remote, session, table, &review_card_rows(user, state)).await
        }
    }
}

/// Diff local favorites against the remote bookmark rows, insert the
/// additions and delete the removals one row at a time.
async fn push_bookmarks(
    remote: &dyn RemoteStore,
    session: &Session,
    state: &LocalAppState,
) -> Result<(), SyncError> {
    let user = session.user_id.as_str();
    let remote_rows: Vec<BookmarkRow> = fetch(remote, session, Table::Bookmarks).await?;
    let mut remote_favorites = favorites_by_kind(&remote_rows);

    let mut failed = 0;
    for kind in FavoriteKind::ALL {
        let remote_ids = remote_favorites.remove(&kind).unwrap_or_default();
        let diff = diff_favorites(state.favorites.get(kind), &remote_ids);
        if diff.is_empty() {
            continue;
        }

        let additions: Vec<BookmarkRow> = diff
            .added
            .iter()
            .map(|id| BookmarkRow::new(user, kind, id))
            .collect();
        if let Err(e) = upsert_rows(remote, session, Table::Bookmarks, &additions).await {
            tracing::warn!(
                kind = kind.as_str(),
                count = additions.len(),
                error = %e,
                "bookmark insert failed"
            );
            failed += additions.len();
        }

        for id in &diff.removed {
            let filter = [
                ("user_id", user.to_string()),
                ("item_type", kind.as_str().to_string()),
                ("item_id", id.clone()),
            ];
            if let Err(e) = remote.delete(session, Table::Bookmarks, &filter).await {
                tracing::warn!(
                    kind = kind.as_str(),
                    item_id = %id,
                    error = %e,
                    "bookmark delete failed"
                );
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(SyncError::Partial { failed });
    }
    Ok(())
}
