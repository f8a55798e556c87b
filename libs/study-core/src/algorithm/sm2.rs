//! SM-2 spaced repetition algorithm.
//!
//! Based on SuperMemo 2 with the classic 0-5 quality scale.

use chrono::{DateTime, Duration, Utc};

use crate::types::{Quality, ReviewCard};

/// Scheduling triple produced by one review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sm2Outcome {
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
}

/// Compute the next ease factor, interval and repetition count.
///
/// The ease factor is recalculated on every review, failed or not, and never
/// drops below [`ReviewCard::MINIMUM_EASE`]. On success the interval grows from
/// the previous interval and the previous ease factor.
pub fn compute_next_review(
    quality: Quality,
    ease_factor: f64,
    interval_days: u32,
    repetitions: u32,
) -> Sm2Outcome {
    let miss = f64::from(Quality::MAX - quality.value());
    let new_ease =
        (ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(ReviewCard::MINIMUM_EASE);

    if !quality.is_success() {
        return Sm2Outcome {
            ease_factor: new_ease,
            interval_days: 1,
            repetitions: 0,
        };
    }

    let new_interval = match repetitions {
        0 => 1,
        1 => 6,
        _ => (f64::from(interval_days) * ease_factor).round().max(1.0) as u32,
    };

    Sm2Outcome {
        ease_factor: new_ease,
        interval_days: new_interval,
        repetitions: repetitions + 1,
    }
}

impl ReviewCard {
    /// Apply a review at `now` and return the updated card.
    pub fn review(&self, quality: Quality, now: DateTime<Utc>) -> ReviewCard {
        let outcome =
            compute_next_review(quality, self.ease_factor, self.interval_days, self.repetitions);

        ReviewCard {
            content_id: self.content_id.clone(),
            card_index: self.card_index,
            ease_factor: outcome.ease_factor,
            interval_days: outcome.interval_days,
            repetitions: outcome.repetitions,
            next_review_date: now + Duration::days(i64::from(outcome.interval_days)),
            last_review_date: Some(now),
        }
    }
}
