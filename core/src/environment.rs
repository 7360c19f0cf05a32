//! Dependency injection traits.
//!
//! All external dependencies are abstracted behind traits and injected via
//! the reducer's `Environment` parameter. The clock is the one dependency
//! every reducer in the engine shares: hold expiry, countdown ticks, cache
//! TTLs, and snapshot timestamps all read time through it so tests can
//! simulate the passage of time without real delays.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability.
///
/// # Examples
///
/// ```
/// use bookflow_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let now = clock.now();
/// assert!(now.timestamp() > 0);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
