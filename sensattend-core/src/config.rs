//! Client configuration
//!
//! Loads the service location from environment variables with sensible defaults.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{AttendanceError, Result};

/// Default matching service location (the service's development address).
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Default path prefix in front of every endpoint.
pub const DEFAULT_API_PREFIX: &str = "/api";

/// Timeout for every request. Face matching on a full classroom photo is slow.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Total time spent retrying one idempotent read before giving up.
pub const READ_RETRY_BUDGET: Duration = Duration::from_secs(5);

/// Initial retry interval for idempotent reads.
pub const INITIAL_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Maximum retry interval for idempotent reads.
pub const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// What the roster view does after a successful add or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilePolicy {
    /// Apply the change locally only (delete removes the entry by roll number).
    #[default]
    Optimistic,
    /// Re-fetch the full roster from the service.
    Refetch,
}

impl FromStr for ReconcilePolicy {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "refetch" => Ok(Self::Refetch),
            other => Err(AttendanceError::InvalidConfig(format!(
                "unknown reconcile policy '{other}' (expected optimistic or refetch)"
            ))),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Service base URL (default: http://127.0.0.1:5000)
    pub server_url: Url,
    /// Path prefix of the API (default: /api)
    pub api_prefix: String,
    /// Roster reconciliation after mutations (default: optimistic)
    pub reconcile: ReconcilePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("default server URL is valid"),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            reconcile: ReconcilePolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration for the service at `server_url`, other settings default.
    pub fn new(server_url: &str) -> Result<Self> {
        Self::default().with_server_url(server_url)
    }

    /// Load configuration from environment variables
    ///
    /// - `SENSATTEND_SERVER_URL` - service base URL
    /// - `SENSATTEND_API_PREFIX` - API path prefix
    /// - `SENSATTEND_RECONCILE` - `optimistic` or `refetch`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SENSATTEND_SERVER_URL") {
            config = config.with_server_url(&url)?;
        }

        if let Ok(prefix) = std::env::var("SENSATTEND_API_PREFIX") {
            config.api_prefix = prefix;
        }

        config.reconcile = std::env::var("SENSATTEND_RECONCILE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Ok(config)
    }

    /// Replace the service base URL. Only `http` and `https` are accepted.
    pub fn with_server_url(mut self, server_url: &str) -> Result<Self> {
        let url = Url::parse(server_url.trim()).map_err(|e| {
            AttendanceError::InvalidConfig(format!("invalid server URL '{server_url}': {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(AttendanceError::InvalidConfig(format!(
                "server URL must be http or https: {server_url}"
            )));
        }
        self.server_url = url;
        Ok(self)
    }

    pub fn with_reconcile(mut self, reconcile: ReconcilePolicy) -> Self {
        self.reconcile = reconcile;
        self
    }

    /// Build an endpoint URL: base, then prefix, then `segments`.
    ///
    /// Each segment is percent-encoded, so a roll number containing `/` stays
    /// a single path segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.server_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                AttendanceError::InvalidConfig("server URL cannot be a base".into())
            })?;
            path.pop_if_empty();
            path.extend(self.api_prefix.split('/').filter(|p| !p.is_empty()));
            path.extend(segments);
        }
        Ok(url)
    }
}
