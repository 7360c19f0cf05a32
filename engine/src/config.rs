//! Flow configuration.
//!
//! Every tunable interval the engine uses lives here with its default, so
//! tests can shrink timings and hosts can override via environment
//! variables.

use std::time::Duration;

/// Tunables for the booking flow.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Base URL of the booking API.
    pub api_base_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// How long a cached availability response stays fresh.
    pub availability_ttl: Duration,
    /// Delay before the single transient-failure retry.
    pub retry_delay: Duration,
    /// Countdown and idle tick interval.
    pub tick_interval: Duration,
    /// Coalescing window for session-snapshot writes.
    pub snapshot_debounce: Duration,
    /// Interval between booking-status polls after a redirect return.
    pub poll_interval: Duration,
    /// Maximum booking-status poll attempts before giving up as pending.
    pub poll_attempts: u32,
    /// Inactivity span after which one idle telemetry event fires.
    pub idle_threshold: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_owned(),
            request_timeout: Duration::from_secs(8),
            availability_ttl: Duration::from_secs(60),
            retry_delay: Duration::from_secs(2),
            tick_interval: Duration::from_secs(1),
            snapshot_debounce: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            poll_attempts: 30,
            idle_threshold: Duration::from_secs(180),
        }
    }
}

impl FlowConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    ///
    /// Recognized variables: `BOOKFLOW_API_URL`, `BOOKFLOW_REQUEST_TIMEOUT_MS`,
    /// `BOOKFLOW_AVAILABILITY_TTL_MS`, `BOOKFLOW_POLL_ATTEMPTS`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("BOOKFLOW_API_URL") {
            config.api_base_url = url;
        }
        if let Some(ms) = env_u64("BOOKFLOW_REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("BOOKFLOW_AVAILABILITY_TTL_MS") {
            config.availability_ttl = Duration::from_millis(ms);
        }
        if let Some(attempts) = env_u64("BOOKFLOW_POLL_ATTEMPTS") {
            config.poll_attempts = u32::try_from(attempts).unwrap_or(config.poll_attempts);
        }

        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable env override");
            None
        },
    }
}
