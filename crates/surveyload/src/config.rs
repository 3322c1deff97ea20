//! Runtime configuration
//!
//! Values come from `SURVEYLOAD_*` environment variables (a `.env` file is
//! loaded by the binary first); command-line flags override them.

use crate::error::{LoadError, Result};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Pause between two polls of a running export job.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Timeout for a single HTTP request, generous enough for archive downloads.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Upper bound on rows per INSERT statement.
pub const DEFAULT_BATCH_ROWS: usize = 1000;

/// Credentials and endpoint of the export service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Base URL, including the workspace segment if the server uses one
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub service: Option<ServiceConfig>,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub batch_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

impl Config {
    /// Load config from environment variables
    ///
    /// - `SURVEYLOAD_HQ_URL`, `SURVEYLOAD_HQ_USER`, `SURVEYLOAD_HQ_PASSWORD`
    /// - `SURVEYLOAD_POLL_INTERVAL_MS`
    /// - `SURVEYLOAD_HTTP_TIMEOUT_SECS`
    /// - `SURVEYLOAD_BATCH_ROWS`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SURVEYLOAD_HQ_URL") {
            config.service = Some(ServiceConfig {
                url,
                username: std::env::var("SURVEYLOAD_HQ_USER").unwrap_or_default(),
                password: std::env::var("SURVEYLOAD_HQ_PASSWORD").unwrap_or_default(),
            });
        }

        if let Some(ms) = env_number::<u64>("SURVEYLOAD_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }

        if let Some(secs) = env_number::<u64>("SURVEYLOAD_HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(rows) = env_number::<usize>("SURVEYLOAD_BATCH_ROWS")? {
            config.batch_rows = rows;
        }

        config.validate()?;
        Ok(config)
    }

    /// Replace the service endpoint, e.g. from command-line flags
    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.service = Some(service);
        self
    }

    /// The service endpoint, required by every command that talks to the server
    pub fn service(&self) -> Result<&ServiceConfig> {
        self.service
            .as_ref()
            .ok_or_else(|| LoadError::config("export service URL is not set (--url or SURVEYLOAD_HQ_URL)"))
    }

    fn validate(&self) -> Result<()> {
        if self.batch_rows == 0 {
            return Err(LoadError::config("SURVEYLOAD_BATCH_ROWS must be at least 1"));
        }
        if self.http_timeout.is_zero() {
            return Err(LoadError::config("SURVEYLOAD_HTTP_TIMEOUT_SECS must be at least 1"));
        }
        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| LoadError::config(format!("{} must be a number, got '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}
