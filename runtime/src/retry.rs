//! Retry logic with bounded backoff for transient failures.
//!
//! The network client retries availability and status calls through this
//! module. Policies are deliberately small: the booking flow retries a
//! transient failure once after a fixed delay (the retried request carries a
//! flag so a retry never triggers another retry), so the defaults here lean
//! conservative.
//!
//! # Example
//!
//! ```rust
//! use bookflow_runtime::retry::{retry_with_predicate, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(1)
//!     .initial_delay(Duration::from_secs(2))
//!     .build();
//!
//! let result = retry_with_predicate(
//!     policy,
//!     || async { Ok::<_, String>(42) },
//!     |err: &String| err.contains("transient"),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration.
///
/// # Default Values
///
/// - `max_retries`: 1
/// - `initial_delay`: 2 seconds
/// - `max_delay`: 10 seconds
/// - `multiplier`: 1.0 (fixed delay)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial call).
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap for backoff growth.
    pub max_delay: Duration,
    /// Multiplier applied per retry; 1.0 keeps the delay fixed.
    pub multiplier: f64,
    /// Scale each delay by a random factor in `0.5..=1.0` to spread out
    /// retries. Off by default: user-visible retries promise a fixed delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            multiplier: 1.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
            jitter: None,
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// `delay = min(initial_delay * multiplier ^ attempt, max_delay)`,
    /// scaled by a random factor in `0.5..=1.0` when jitter is enabled.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base = if attempt == 0 {
            self.initial_delay.min(self.max_delay)
        } else {
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            let delay_ms =
                self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let delay = Duration::from_millis(delay_ms as u64);

            delay.min(self.max_delay)
        };

        if self.jitter {
            use rand::Rng;
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            base.mul_f64(factor)
        } else {
            base
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: Option<usize>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<bool>,
}

impl RetryPolicyBuilder {
    /// Set maximum number of retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the backoff cap.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_delay: self.initial_delay.unwrap_or(defaults.initial_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}

/// Retry an async operation, consulting a predicate to decide whether an
/// error is worth retrying.
///
/// Conflict and validation errors must not be retried; the predicate is how
/// callers encode that taxonomy.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first error the
/// predicate rejects.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(result);
            },
            Err(err) => {
                if !is_retryable(&err) {
                    tracing::debug!(error = %err, "error is not retryable");
                    return Err(err);
                }

                if attempt >= policy.max_retries {
                    tracing::error!(attempt, error = %err, "operation failed after max retries");
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "operation failed, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            },
        }
    }
}
