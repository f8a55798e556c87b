//! Outbound queue: which tables still need pushing, and when to retry them.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::remote::Table;

/// Exponential backoff for failed table pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempts` (1-based): `base * 2^(attempts - 1)`,
    /// capped at `max`.
    pub fn delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    attempts: u32,
    retry_at: Option<Instant>,
}

/// Tables waiting to be pushed. A table leaves the queue only on success.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: BTreeMap<Table, Entry>,
    policy: RetryPolicy,
}

impl OutboundQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            entries: BTreeMap::new(),
            policy,
        }
    }

    /// Queue `tables`. Tables already queued keep their attempt count.
    pub fn enqueue(&mut self, tables: impl IntoIterator<Item = Table>) {
        for table in tables {
            self.entries.entry(table).or_default();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every queued table, regardless of backoff.
    pub fn tables(&self) -> Vec<Table> {
        self.entries.keys().copied().collect()
    }

    /// Failed tables whose retry time has come.
    pub fn due(&self, now: Instant) -> Vec<Table> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.retry_at.is_some_and(|at| at <= now))
            .map(|(table, _)| *table)
            .collect()
    }

    pub fn next_retry_at(&self) -> Option<Instant> {
        self.entries.values().filter_map(|entry| entry.retry_at).min()
    }

    pub fn attempts(&self, table: Table) -> u32 {
        self.entries.get(&table).map_or(0, |entry| entry.attempts)
    }

    pub fn complete(&mut self, table: Table) {
        self.entries.remove(&table);
    }

    /// Record a failed push and schedule the retry. Returns the delay used.
    pub fn fail(&mut self, table: Table, now: Instant) -> Duration {
        let entry = self.entries.entry(table).or_default();
        entry.attempts += 1;
        let delay = self.policy.delay(entry.attempts);
        entry.retry_at = Some(now + delay);
        delay
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
