//! Shared fixtures for the sync integration tests.
//!
//! `FakeRemote` keeps every table in memory, honours the same natural-key
//! upsert semantics as the real backend, and can be told to fail a table.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use pharmacy_sync::db::SqliteRepository;
use pharmacy_sync::state::AppStore;
use pharmacy_sync::sync::{RetryPolicy, SyncCoordinator};
use pharmacy_sync::{RemoteStore, Session, SyncError, SyncSettings, Table};

pub const USER: &str = "user-1";

#[derive(Default)]
pub struct FakeRemote {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
    failing: Mutex<HashSet<Table>>,
    failing_writes: Mutex<HashSet<Table>>,
    upserts: Mutex<HashMap<Table, usize>>,
    calls: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, table: Table, rows: Vec<Value>) {
        self.tables.lock().unwrap().entry(table).or_default().extend(rows);
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables.lock().unwrap().get(&table).cloned().unwrap_or_default()
    }

    pub fn fail_table(&self, table: Table) {
        self.failing.lock().unwrap().insert(table);
    }

    /// Fail upserts and deletes on `table` while reads keep working.
    pub fn fail_writes(&self, table: Table) {
        self.failing_writes.lock().unwrap().insert(table);
    }

    pub fn heal_table(&self, table: Table) {
        self.failing.lock().unwrap().remove(&table);
        self.failing_writes.lock().unwrap().remove(&table);
    }

    /// Successful upsert calls made against `table`.
    pub fn upsert_count(&self, table: Table) -> usize {
        self.upserts.lock().unwrap().get(&table).copied().unwrap_or(0)
    }

    /// Every call made, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, table: Table, write: bool) -> Result<(), SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing.lock().unwrap().contains(&table)
            || (write && self.failing_writes.lock().unwrap().contains(&table));
        if failing {
            return Err(SyncError::Network(format!("{table} unavailable")));
        }
        Ok(())
    }
}

fn same_key(table: Table, a: &Value, b: &Value) -> bool {
    table
        .conflict_target()
        .split(',')
        .all(|column| a.get(column) == b.get(column))
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn select(&self, session: &Session, table: Table) -> Result<Vec<Value>, SyncError> {
        self.check(table, false)?;
        let user = Some(session.user_id.as_str());
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|row| row.get("user_id").and_then(Value::as_str) == user)
            .collect())
    }

    async fn upsert(
        &self,
        _session: &Session,
        table: Table,
        rows: Vec<Value>,
    ) -> Result<(), SyncError> {
        self.check(table, true)?;
        let mut tables = self.tables.lock().unwrap();
        let stored = tables.entry(table).or_default();
        for row in rows {
            match stored.iter_mut().find(|existing| same_key(table, existing, &row)) {
                Some(existing) => *existing = row,
                None => stored.push(row),
            }
        }
        *self.upserts.lock().unwrap().entry(table).or_default() += 1;
        Ok(())
    }

    async fn delete(
        &self,
        _session: &Session,
        table: Table,
        filter: &[(&str, String)],
    ) -> Result<(), SyncError> {
        self.check(table, true)?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(stored) = tables.get_mut(&table) {
            stored.retain(|row| {
                !filter.iter().all(|(column, value)| {
                    row.get(*column).and_then(Value::as_str) == Some(value.as_str())
                })
            });
        }
        Ok(())
    }
}

pub fn settings() -> SyncSettings {
    SyncSettings {
        debounce: Duration::from_millis(2000),
        retry: RetryPolicy {
            base: Duration::from_millis(1000),
            max: Duration::from_secs(60),
        },
    }
}

pub fn store() -> AppStore {
    AppStore::open(SqliteRepository::open_in_memory().unwrap()).unwrap()
}

pub fn session() -> Session {
    Session::new(USER, "test-token")
}

pub fn start(store: &AppStore, remote: &Arc<FakeRemote>) -> SyncCoordinator {
    SyncCoordinator::start(store.clone(), remote.clone(), settings())
}

/// Advance the paused clock by `ms` milliseconds.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
