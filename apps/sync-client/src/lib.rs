pub mod config;
pub mod db;
pub mod remote;
pub mod state;
pub mod sync;
pub mod telemetry;

use std::sync::Arc;

use anyhow::Context;

use crate::config::ClientConfig;
use crate::db::SqliteRepository;
use crate::remote::RestRemoteStore;
use crate::state::AppStore;
use crate::sync::SyncCoordinator;

pub use crate::config::SyncSettings;
pub use crate::remote::{RemoteStore, Session, Table};
pub use crate::sync::{SyncError, SyncStats, SyncStatus};

/// Local store plus the coordinator syncing it.
#[derive(Clone)]
pub struct App {
    pub store: AppStore,
    pub sync: SyncCoordinator,
}

/// Open the local database and start syncing against the configured remote.
///
/// Must be called from within a tokio runtime.
pub fn open(config: ClientConfig) -> anyhow::Result<App> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }

    tracing::info!(path = %config.db_path.display(), "opening local database");
    let repository = SqliteRepository::open(&config.db_path)?;
    let store = AppStore::open(repository)?;

    let remote = Arc::new(RestRemoteStore::new(config.remote_url, config.remote_api_key));
    let sync = SyncCoordinator::start(store.clone(), remote, config.sync);

    Ok(App { store, sync })
}
