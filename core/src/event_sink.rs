//! Event sink abstraction for best-effort telemetry.
//!
//! The engine reports funnel events (views, requests, errors, hold creation,
//! confirmation) through the [`EventSink`] trait instead of calling any
//! platform global directly. Sinks are strictly best-effort: a sink that
//! fails, blocks, or is absent must never affect the booking flow, so the
//! trait is synchronous fire-and-forget and implementations swallow their own
//! errors.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Reducer    │── transition ──► Effect
//! └──────┬───────┘
//!        │ emit (best-effort, non-blocking)
//!        ▼
//! ┌──────────────┐     ┌──────────────┐
//! │  FanoutSink  │────►│  local sink  │ (tracing)
//! │              │────►│  host frame  │ (cross-frame envelope)
//! │              │────►│  analytics   │ (bounded queue)
//! └──────────────┘     └──────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A telemetry event envelope.
///
/// The generic wire form is `{"type": "event", "name": ..., ...payload}`.
/// A fixed subset of high-value names additionally gets a type-qualified
/// variant (`{"type": "bookflow:<name>", ...}`) so a hosting page can filter
/// without parsing payloads; producing that variant is the sink's concern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Envelope discriminator, always `"event"` for the generic form.
    #[serde(rename = "type")]
    pub kind: String,

    /// Event name, e.g. `"hold-created"`.
    pub name: String,

    /// Flattened event payload.
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl Envelope {
    /// Build a generic event envelope.
    #[must_use]
    pub fn event(name: impl Into<String>, payload: serde_json::Value) -> Self {
        let payload = match payload {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_owned(), other);
                map
            },
        };
        Self {
            kind: "event".to_owned(),
            name: name.into(),
            payload,
        }
    }

    /// The type-qualified variant of this envelope for host-page filtering.
    #[must_use]
    pub fn type_qualified(&self) -> Self {
        Self {
            kind: format!("bookflow:{}", self.name),
            name: self.name.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// Destination for telemetry envelopes.
///
/// Implementations must be non-blocking and must not propagate failures.
pub trait EventSink: Send + Sync {
    /// Deliver one envelope. Infallible by contract; implementations log and
    /// drop on internal failure.
    fn emit(&self, envelope: &Envelope);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, envelope: &Envelope) {
        (**self).emit(envelope);
    }
}

/// A sink that discards everything. Useful as a default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _envelope: &Envelope) {}
}

/// Fan-out over several sinks. Each sink sees every envelope; one sink's
/// behavior never affects another's.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    /// Create an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a destination sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, envelope: &Envelope) {
        for sink in &self.sinks {
            sink.emit(envelope);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Collect(Mutex<Vec<String>>);

    impl EventSink for Collect {
        fn emit(&self, envelope: &Envelope) {
            if let Ok(mut seen) = self.0.lock() {
                seen.push(envelope.name.clone());
            }
        }
    }

    #[test]
    fn envelope_wire_form_is_flat() {
        let env = Envelope::event("hold-created", serde_json::json!({"holdId": "h1"}));
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire["type"], "event");
        assert_eq!(wire["name"], "hold-created");
        assert_eq!(wire["holdId"], "h1");
    }

    #[test]
    fn type_qualified_variant_keeps_payload() {
        let env = Envelope::event("confirm", serde_json::json!({"bookingId": "b1"}));
        let qualified = env.type_qualified();
        assert_eq!(qualified.kind, "bookflow:confirm");
        assert_eq!(qualified.payload, env.payload);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(Collect(Mutex::new(Vec::new())));
        let b = Arc::new(Collect(Mutex::new(Vec::new())));
        let fanout = FanoutSink::new()
            .with(a.clone() as Arc<dyn EventSink>)
            .with(b.clone() as Arc<dyn EventSink>);

        fanout.emit(&Envelope::event("view", serde_json::Value::Null));

        assert_eq!(a.0.lock().unwrap().as_slice(), ["view"]);
        assert_eq!(b.0.lock().unwrap().as_slice(), ["view"]);
    }
}
