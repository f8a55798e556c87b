//! Spaced repetition scheduling.

pub mod sm2;

use chrono::{DateTime, Utc};

use crate::types::ReviewCard;

/// Cards whose next review date has passed. A plain filter; no index is kept.
pub fn due_cards<'a, I>(cards: I, now: DateTime<Utc>) -> Vec<&'a ReviewCard>
where
    I: IntoIterator<Item = &'a ReviewCard>,
{
    cards.into_iter().filter(|card| card.is_due(now)).collect()
}
