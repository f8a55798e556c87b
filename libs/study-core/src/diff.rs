//! Favorites diffing for the push path.

use std::collections::BTreeSet;

/// Ids to insert remotely and ids to delete remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoritesDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl FavoritesDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare the local favorite set against what the remote currently holds.
pub fn diff_favorites(local: &BTreeSet<String>, remote: &BTreeSet<String>) -> FavoritesDiff {
    FavoritesDiff {
        added: local.difference(remote).cloned().collect(),
        removed: remote.difference(local).cloned().collect(),
    }
}
