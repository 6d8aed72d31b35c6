//! Runtime configuration, read from `STAFFSYNC_*` environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `STAFFSYNC_API_URL` | `http://localhost:8080` |
//! | `STAFFSYNC_AUTH_TOKEN` | unset |
//! | `STAFFSYNC_QUEUE_DB` | `{data_dir}/staffsync/queue.db` |
//! | `STAFFSYNC_PROBE_INTERVAL_SECS` | `15` |
//! | `STAFFSYNC_REQUEST_TIMEOUT_SECS` | `30` |
//! | `STAFFSYNC_REPLAY_TIMEOUT_SECS` | unset (no per-action budget) |

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_URL_VAR: &str = "STAFFSYNC_API_URL";
const AUTH_TOKEN_VAR: &str = "STAFFSYNC_AUTH_TOKEN";
const QUEUE_DB_VAR: &str = "STAFFSYNC_QUEUE_DB";
const PROBE_INTERVAL_VAR: &str = "STAFFSYNC_PROBE_INTERVAL_SECS";
const REQUEST_TIMEOUT_VAR: &str = "STAFFSYNC_REQUEST_TIMEOUT_SECS";
const REPLAY_TIMEOUT_VAR: &str = "STAFFSYNC_REPLAY_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub queue_db_path: PathBuf,
    pub probe_interval: Duration,
    pub request_timeout: Duration,
    pub replay_timeout: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            auth_token: None,
            queue_db_path: default_queue_db_path(),
            probe_interval: DEFAULT_PROBE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            replay_timeout: None,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable source. Unset and blank
    /// variables fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(api_url) = get(API_URL_VAR) {
            config.api_url = api_url.trim().to_string();
        }
        config.auth_token = get(AUTH_TOKEN_VAR);
        if let Some(path) = get(QUEUE_DB_VAR) {
            config.queue_db_path = PathBuf::from(path);
        }
        if let Some(value) = get(PROBE_INTERVAL_VAR) {
            config.probe_interval = parse_secs(PROBE_INTERVAL_VAR, &value)?;
        }
        if let Some(value) = get(REQUEST_TIMEOUT_VAR) {
            config.request_timeout = parse_secs(REQUEST_TIMEOUT_VAR, &value)?;
        }
        if let Some(value) = get(REPLAY_TIMEOUT_VAR) {
            config.replay_timeout = Some(parse_secs(REPLAY_TIMEOUT_VAR, &value)?);
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_queue_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.queue_db_path = path.into();
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_replay_timeout(mut self, timeout: Duration) -> Self {
        self.replay_timeout = Some(timeout);
        self
    }
}

fn parse_secs(var: &str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|_| invalid("expected a whole number of seconds"))?;
    if secs == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// `{data_dir}/staffsync/queue.db`, falling back to `~/.local/share` and
/// finally to the working directory.
fn default_queue_db_path() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut home| {
                home.push(".local");
                home.push("share");
                home
            })
        })
        .unwrap_or_else(|| PathBuf::from("."));
    path.push("staffsync");
    path.push("queue.db");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.auth_token, None);
        assert_eq!(config.probe_interval, Duration::from_secs(15));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.replay_timeout, None);
        assert!(config.queue_db_path.ends_with("staffsync/queue.db"));
    }

    #[test]
    fn variables_override_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("STAFFSYNC_API_URL", "https://api.staffsync.test"),
            ("STAFFSYNC_AUTH_TOKEN", "secret"),
            ("STAFFSYNC_QUEUE_DB", "/tmp/q.db"),
            ("STAFFSYNC_PROBE_INTERVAL_SECS", "5"),
            ("STAFFSYNC_REPLAY_TIMEOUT_SECS", " 20 "),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://api.staffsync.test");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.queue_db_path, PathBuf::from("/tmp/q.db"));
        assert_eq!(config.probe_interval, Duration::from_secs(5));
        assert_eq!(config.replay_timeout, Some(Duration::from_secs(20)));
    }

    #[test]
    fn blank_token_counts_as_unset() {
        let config = SyncConfig::from_lookup(lookup(&[("STAFFSYNC_AUTH_TOKEN", "  ")])).unwrap();
        assert_eq!(config.auth_token, None);
    }

    #[test]
    fn malformed_durations_are_rejected() {
        let err = SyncConfig::from_lookup(lookup(&[("STAFFSYNC_PROBE_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref var, .. } if var == "STAFFSYNC_PROBE_INTERVAL_SECS"
        ));

        assert!(
            SyncConfig::from_lookup(lookup(&[("STAFFSYNC_REQUEST_TIMEOUT_SECS", "0")])).is_err()
        );
    }
}
