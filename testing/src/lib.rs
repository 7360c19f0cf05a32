//! # Bookflow Testing
//!
//! Testing utilities and helpers for the bookflow engine:
//!
//! - Mock implementations of environment traits (clock, event sink)
//! - The [`ReducerTest`] Given/When/Then builder
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use bookflow_testing::{test_clock, ReducerTest};
//!
//! ReducerTest::new(BookingFlowReducer)
//!     .with_env(test_environment())
//!     .given_state(FlowState::default())
//!     .when_action(FlowAction::CountdownTick { hold_id })
//!     .then_state(|state| assert!(state.hold.is_none()))
//!     .run();
//! ```

use chrono::{DateTime, Duration, Utc};
use bookflow_core::environment::Clock;


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use bookflow_core::event_sink::{Envelope, EventSink};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making tests reproducible.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// A clock tests can step forward to simulate countdowns and TTL expiry
    /// without real delays.
    #[derive(Debug, Clone)]
    pub struct SteppingClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl SteppingClock {
        /// Create a stepping clock starting at the given time.
        #[must_use]
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Arc::new(Mutex::new(start)),
            }
        }

        /// Advance the clock.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned, which only happens if a
        /// previous test assertion panicked while stepping.
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }

        /// Set the clock to an absolute time.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, to: DateTime<Utc>) {
            *self.now.lock().unwrap() = to;
        }
    }

    impl Clock for SteppingClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    /// Event sink that records every envelope it receives.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<Envelope>>,
    }

    impl RecordingSink {
        /// Create an empty recording sink.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Names of all recorded events, in emission order.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn names(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.name.clone())
                .collect()
        }

        /// All recorded envelopes.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn envelopes(&self) -> Vec<Envelope> {
            self.events.lock().unwrap().clone()
        }

        /// Whether an event with the given name was recorded.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn saw(&self, name: &str) -> bool {
            self.events.lock().unwrap().iter().any(|e| e.name == name)
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, envelope: &Envelope) {
            if let Ok(mut events) = self.events.lock() {
                events.push(envelope.clone());
            }
        }
    }

    /// Create a default fixed clock for tests (2025-06-01 12:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which never happens
    /// in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// The fixed instant used by [`test_clock`].
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }
}

pub use mocks::{test_clock, test_epoch, FixedClock, RecordingSink, SteppingClock};
