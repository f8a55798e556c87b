//! Sync coordinator for cloud synchronization.
//!
//! Local state is authoritative. On sign-in the coordinator pulls every remote
//! table and merges it into the store; afterwards each published snapshot
//! restarts a trailing debounce timer, and when it fires every queued table is
//! pushed from the snapshot current at that moment. Remote failures are logged
//! and the failed table is retried with exponential backoff.

pub mod outbound;
pub mod pull;
pub mod push;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};

use crate::config::SyncSettings;
use crate::remote::{RemoteStore, Session, Table};
use crate::state::AppStore;
use outbound::OutboundQueue;
use study_core::LocalAppState;

pub use outbound::RetryPolicy;

/// Sync errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{failed} row operations failed")]
    Partial { failed: usize },
}

/// Sync status for UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SyncStatus {
    /// No session; changes stay local.
    Idle,
    Pulling,
    Merging,
    /// Signed in and waiting for local changes.
    Synced { last_push_at: Option<String> },
    Pushing { tables: Vec<Table> },
}

/// Sync statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub pulls: usize,
    pub push_cycles: usize,
    pub tables_pushed: usize,
    pub push_failures: usize,
}

#[derive(Debug)]
enum Command {
    SignIn(Session),
    SignOut,
    Shutdown,
}

/// Inner state shared with the worker task.
struct CoordinatorInner {
    store: AppStore,
    remote: Arc<dyn RemoteStore>,
    settings: SyncSettings,
    status: Mutex<SyncStatus>,
    stats: Mutex<SyncStats>,
}

/// Handle to the background sync worker.
///
/// Clone-able; every clone talks to the same worker.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
    commands: mpsc::UnboundedSender<Command>,
}

impl SyncCoordinator {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(store: AppStore, remote: Arc<dyn RemoteStore>, settings: SyncSettings) -> Self {
        let changes = store.subscribe();
        let inner = Arc::new(CoordinatorInner {
            store,
            remote,
            settings,
            status: Mutex::new(SyncStatus::Idle),
            stats: Mutex::new(SyncStats::default()),
        });
        let (commands, rx) = mpsc::unbounded_channel();

        tokio::spawn(inner.clone().run(rx, changes));

        Self { inner, commands }
    }

    /// Pull and merge remote data for `session`, then keep pushing local
    /// changes for it.
    pub fn sign_in(&self, session: Session) {
        self.send(Command::SignIn(session));
    }

    /// Stop syncing. A pending debounce or retry is dropped; a push already
    /// running is allowed to finish.
    pub fn sign_out(&self) {
        self.send(Command::SignOut);
    }

    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    /// Get current sync status.
    pub async fn status(&self) -> SyncStatus {
        self.inner.status.lock().await.clone()
    }

    pub async fn stats(&self) -> SyncStats {
        self.inner.stats.lock().await.clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("sync worker has stopped, command dropped");
        }
    }
}

/// Wait for `at`, or forever when there is nothing scheduled.
async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Tables that may be pushed: everything except tables whose pull failed.
fn pushable(unpulled: &BTreeSet<Table>) -> impl Iterator<Item = Table> + '_ {
    Table::ALL.into_iter().filter(|table| !unpulled.contains(table))
}

impl CoordinatorInner {
    async fn run(
        self: Arc<Self>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut changes: watch::Receiver<Arc<LocalAppState>>,
    ) {
        let mut session: Option<Session> = None;
        let mut queue = OutboundQueue::new(self.settings.retry);
        let mut debounce_at: Option<Instant> = None;
        // Tables whose last pull failed. Their remote rows are unknown, so
        // pushing local defaults over them could erase cloud data.
        let mut unpulled: BTreeSet<Table> = BTreeSet::new();

        loop {
            let wake = match (debounce_at, queue.next_retry_at()) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::SignIn(next)) => {
                        tracing::info!(user_id = %next.user_id, "signed in, pulling remote state");
                        queue.clear();
                        self.set_status(SyncStatus::Pulling).await;
                        let outcome = pull::pull_snapshot(self.remote.as_ref(), &next).await;
                        self.set_status(SyncStatus::Merging).await;
                        unpulled = self.apply_pull(outcome).await;
                        changes.borrow_and_update();
                        // Push the merged result once, including anything
                        // recorded while signed out.
                        queue.enqueue(pushable(&unpulled));
                        debounce_at = Some(Instant::now() + self.settings.debounce);
                        session = Some(next);
                        self.set_status(SyncStatus::Synced { last_push_at: None }).await;
                    }
                    Some(Command::SignOut) => {
                        tracing::info!("signed out, sync paused");
                        session = None;
                        debounce_at = None;
                        queue.clear();
                        unpulled.clear();
                        self.set_status(SyncStatus::Idle).await;
                    }
                    Some(Command::Shutdown) | None => break,
                },
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    changes.borrow_and_update();
                    if session.is_some() {
                        queue.enqueue(pushable(&unpulled));
                        debounce_at = Some(Instant::now() + self.settings.debounce);
                    }
                }
                _ = sleep_until_opt(wake) => {
                    let Some(active) = session.as_ref() else {
                        continue;
                    };
                    let now = Instant::now();
                    let tables = if debounce_at.is_some_and(|at| at <= now) {
                        debounce_at = None;
                        if !unpulled.is_empty() {
                            let retry = std::mem::take(&mut unpulled);
                            let outcome =
                                pull::pull_tables(self.remote.as_ref(), active, &retry).await;
                            unpulled = self.apply_pull(outcome).await;
                            changes.borrow_and_update();
                            let recovered: Vec<Table> =
                                retry.difference(&unpulled).copied().collect();
                            if !recovered.is_empty() {
                                tracing::info!(?recovered, "pull recovered");
                            }
                            queue.enqueue(recovered);
                        }
                        queue.tables()
                    } else {
                        queue.due(now)
                    };
                    if !tables.is_empty() {
                        self.push_cycle(active, tables, &mut queue).await;
                    }
                }
            }
        }

        tracing::debug!("sync worker stopped");
    }

    /// Merge a pull into the store and return the tables that failed.
    async fn apply_pull(&self, outcome: pull::PullOutcome) -> BTreeSet<Table> {
        if let Err(e) = self.store.merge_remote(&outcome.snapshot, Utc::now()) {
            tracing::warn!(error = %e, "failed to persist merged state");
        }
        self.stats.lock().await.pulls += 1;
        outcome.failed
    }

    /// Push `tables` concurrently from the current snapshot. Each table
    /// succeeds or fails on its own.
    async fn push_cycle(&self, session: &Session, tables: Vec<Table>, queue: &mut OutboundQueue) {
        let state = self.store.snapshot();
        self.set_status(SyncStatus::Pushing { tables: tables.clone() }).await;

        let mut tasks = JoinSet::new();
        for table in tables {
            let remote = self.remote.clone();
            let session = session.clone();
            let state = state.clone();
            tasks.spawn(async move {
                let result = push::push_table(remote.as_ref(), &session, table, &state).await;
                (table, result)
            });
        }

        let mut pushed = 0;
        let mut failures = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((table, Ok(()))) => {
                    queue.complete(table);
                    pushed += 1;
                }
                Ok((table, Err(e))) => {
                    let delay = queue.fail(table, Instant::now());
                    failures += 1;
                    tracing::warn!(
                        table = %table,
                        error = %e,
                        attempts = queue.attempts(table),
                        retry_in_ms = delay.as_millis() as u64,
                        "push failed"
                    );
                }
                Err(e) => tracing::warn!(error = %e, "push task aborted"),
            }
        }

        {
            let mut stats = self.stats.lock().await;
            stats.push_cycles += 1;
            stats.tables_pushed += pushed;
            stats.push_failures += failures;
        }
        tracing::debug!(pushed, failures, "push cycle finished");

        self.set_status(SyncStatus::Synced {
            last_push_at: Some(Utc::now().to_rfc3339()),
        })
        .await;
    }

    async fn set_status(&self, status: SyncStatus) {
        *self.status.lock().await = status;
    }
}
