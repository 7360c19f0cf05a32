//! Flow environment.
//!
//! Explicitly constructed dependencies, threaded through the reducer instead
//! of imported as singletons: the API client, the session store, the clock,
//! and the telemetry sink.

use crate::api::BookingApi;
use crate::config::FlowConfig;
use crate::persistence::SessionStore;
use bookflow_core::environment::Clock;
use bookflow_core::event_sink::EventSink;
use std::sync::Arc;

/// Dependencies of the booking flow reducer.
#[derive(Clone)]
pub struct FlowEnvironment {
    /// The booking API.
    pub api: Arc<dyn BookingApi>,
    /// Durable session storage.
    pub sessions: Arc<dyn SessionStore>,
    /// Injectable clock; tests simulate time without real delays.
    pub clock: Arc<dyn Clock>,
    /// Best-effort telemetry destination.
    pub sink: Arc<dyn EventSink>,
    /// Flow tunables.
    pub config: FlowConfig,
}

impl FlowEnvironment {
    /// Assemble an environment.
    #[must_use]
    pub fn new(
        api: Arc<dyn BookingApi>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        config: FlowConfig,
    ) -> Self {
        Self {
            api,
            sessions,
            clock,
            sink,
            config,
        }
    }
}
