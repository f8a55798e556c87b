//! Client configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::sync::RetryPolicy;

pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;
pub const DEFAULT_RETRY_BASE_MS: u64 = 1000;
pub const DEFAULT_RETRY_MAX_MS: u64 = 300_000;

/// Timing knobs for the sync coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Quiet period after the last local change before a push.
    pub debounce: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub remote_url: String,
    pub remote_api_key: String,
    pub db_path: PathBuf,
    pub sync: SyncSettings,
}

impl ClientConfig {
    /// Read configuration from the process environment, loading `.env` first
    /// when present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let remote_url =
            std::env::var("PHARMA_REMOTE_URL").context("PHARMA_REMOTE_URL must be set")?;
        let remote_api_key =
            std::env::var("PHARMA_REMOTE_API_KEY").context("PHARMA_REMOTE_API_KEY must be set")?;
        let db_path = std::env::var("PHARMA_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());

        let debounce = env_ms("PHARMA_SYNC_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS);
        let base = env_ms("PHARMA_SYNC_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS);
        let max = env_ms("PHARMA_SYNC_RETRY_MAX_MS", DEFAULT_RETRY_MAX_MS);

        Ok(Self {
            remote_url,
            remote_api_key,
            db_path,
            sync: SyncSettings {
                debounce,
                retry: RetryPolicy { base, max: max.max(base) },
            },
        })
    }
}

/// Parse a millisecond count. Missing values use `default`; unparsable
/// values are logged and also use `default`.
fn parse_duration_ms(name: &str, raw: Option<String>, default: u64) -> Duration {
    let ms = match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %raw, default, "invalid duration, using default");
            default
        }),
    };
    Duration::from_millis(ms)
}

fn env_ms(name: &str, default: u64) -> Duration {
    parse_duration_ms(name, std::env::var(name).ok(), default)
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pharmacy-study")
        .join("state.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_duration_uses_default() {
        assert_eq!(parse_duration_ms("X", None, 2000), Duration::from_millis(2000));
    }

    #[test]
    fn valid_duration_is_parsed() {
        assert_eq!(
            parse_duration_ms("X", Some(" 750 ".into()), 2000),
            Duration::from_millis(750)
        );
    }

    #[test]
    fn invalid_duration_falls_back() {
        assert_eq!(parse_duration_ms("X", Some("soon".into()), 1000), Duration::from_millis(1000));
        assert_eq!(parse_duration_ms("X", Some("-5".into()), 1000), Duration::from_millis(1000));
    }

    #[test]
    fn default_db_path_is_namespaced() {
        let path = default_db_path();
        assert!(path.ends_with("pharmacy-study/state.db"));
    }

    #[test]
    fn default_settings() {
        let settings = SyncSettings::default();
        assert_eq!(settings.debounce, Duration::from_secs(2));
        assert_eq!(settings.retry.base, Duration::from_secs(1));
        assert_eq!(settings.retry.max, Duration::from_secs(300));
    }
}
