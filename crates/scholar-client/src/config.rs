use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// Client settings. [`ClientConfig::from_env`] reads the `SCHOLAR_*`
/// variables; the CLI overrides individual fields from its flags.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL including the `/api` prefix.
    pub base_url: String,
    pub request_timeout: Duration,
    /// Deadline for the aggregated dashboard prefetch.
    pub load_timeout: Duration,
    /// JSON file standing in for browser local storage. None keeps
    /// everything in memory.
    pub store_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            load_timeout: Duration::from_secs(15),
            store_path: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("SCHOLAR_API_URL").unwrap_or(defaults.base_url),
            request_timeout: env_secs("SCHOLAR_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout),
            load_timeout: env_secs("SCHOLAR_LOAD_TIMEOUT_SECS").unwrap_or(defaults.load_timeout),
            store_path: std::env::var("SCHOLAR_STORE_PATH").ok().map(PathBuf::from),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            warn!("{} is not a whole number of seconds ('{}'), ignoring", key, raw);
            None
        }
    }
}
