//! Funnel telemetry.
//!
//! The reducer reports transitions as [`FlowEvent`]s, rendered into the
//! generic envelope and fanned out to whatever sinks the host wired up:
//! a local tracing sink, a host-frame channel, an analytics queue. All of it
//! is best-effort; a sink that fails or a queue that is full drops the event
//! and the flow never notices.

use crate::error::ErrorCode;
use crate::types::{BookingId, HoldId};
use bookflow_core::event_sink::{Envelope, EventSink};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Event names that additionally get the type-qualified envelope variant, so
/// a hosting page can filter them without parsing payloads.
pub const HIGH_VALUE_EVENTS: &[&str] = &["view", "hold-created", "confirm", "error"];

/// One funnel event.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowEvent {
    /// A flow step became visible.
    View {
        /// Step name, e.g. `"slot_selection"`.
        step: &'static str,
    },
    /// A network request started.
    Request {
        /// Operation name, e.g. `"availability"`.
        name: &'static str,
    },
    /// An error was surfaced to the user.
    Error {
        /// The closed-vocabulary code.
        code: ErrorCode,
    },
    /// The user picked a slot.
    SlotSelected {
        /// Slot start.
        start_at: DateTime<Utc>,
    },
    /// A hold was created.
    HoldCreated {
        /// Server-assigned id.
        hold_id: HoldId,
        /// Server-side expiry.
        expires_at: DateTime<Utc>,
    },
    /// The active hold expired unconsumed.
    HoldExpired {
        /// The hold that lapsed.
        hold_id: HoldId,
    },
    /// A promo code was applied to the hold.
    PromoApplied {
        /// The code.
        code: String,
    },
    /// Checkout began.
    CheckoutStarted {
        /// `"gift_card"`, `"in_page"`, `"redirect"`, or `"no_payment"`.
        method: &'static str,
    },
    /// A booking was confirmed.
    Confirmed {
        /// Server reference.
        booking_id: BookingId,
    },
    /// The user went idle.
    Idle {
        /// Seconds since last activity.
        seconds: i64,
    },
}

impl FlowEvent {
    /// The event name on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::View { .. } => "view",
            Self::Request { .. } => "request",
            Self::Error { .. } => "error",
            Self::SlotSelected { .. } => "selection",
            Self::HoldCreated { .. } => "hold-created",
            Self::HoldExpired { .. } => "hold-expired",
            Self::PromoApplied { .. } => "promo-applied",
            Self::CheckoutStarted { .. } => "checkout-started",
            Self::Confirmed { .. } => "confirm",
            Self::Idle { .. } => "idle",
        }
    }

    /// Render into the generic envelope.
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        let payload = match self {
            Self::View { step } => serde_json::json!({ "step": step }),
            Self::Request { name } => serde_json::json!({ "name": name }),
            Self::Error { code } => serde_json::json!({ "code": code.as_str() }),
            Self::SlotSelected { start_at } => serde_json::json!({ "startAt": start_at }),
            Self::HoldCreated { hold_id, expires_at } => {
                serde_json::json!({ "holdId": hold_id, "expiresAt": expires_at })
            },
            Self::HoldExpired { hold_id } => serde_json::json!({ "holdId": hold_id }),
            Self::PromoApplied { code } => serde_json::json!({ "code": code }),
            Self::CheckoutStarted { method } => serde_json::json!({ "method": method }),
            Self::Confirmed { booking_id } => serde_json::json!({ "bookingId": booking_id }),
            Self::Idle { seconds } => serde_json::json!({ "seconds": seconds }),
        };
        Envelope::event(self.name(), payload)
    }
}

/// Emit an event to a sink, producing the type-qualified variant for the
/// high-value subset.
pub fn emit(sink: &dyn EventSink, event: &FlowEvent) {
    let envelope = event.envelope();
    sink.emit(&envelope);
    if HIGH_VALUE_EVENTS.contains(&envelope.name.as_str()) {
        sink.emit(&envelope.type_qualified());
    }
}

/// Sink that logs every envelope through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSink;

impl EventSink for LocalSink {
    fn emit(&self, envelope: &Envelope) {
        tracing::debug!(
            target: "bookflow::telemetry",
            kind = %envelope.kind,
            name = %envelope.name,
            "flow event"
        );
    }
}

/// Sink that posts serialized envelopes across a frame boundary.
///
/// The host supplies the actual posting function (the engine never touches
/// platform globals); serialization failures are dropped.
#[derive(Clone)]
pub struct HostFrameSink {
    post: Arc<dyn Fn(String) + Send + Sync>,
}

impl HostFrameSink {
    /// Wrap a host-provided posting function.
    pub fn new(post: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self { post: Arc::new(post) }
    }
}

impl EventSink for HostFrameSink {
    fn emit(&self, envelope: &Envelope) {
        if let Ok(json) = serde_json::to_string(envelope) {
            (self.post)(json);
        }
    }
}

/// Sink that feeds a bounded analytics queue. A full queue drops the event.
#[derive(Clone)]
pub struct AnalyticsQueueSink {
    tx: tokio::sync::mpsc::Sender<Envelope>,
}

impl AnalyticsQueueSink {
    /// Create a sink and the receiving end of its queue.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<Envelope>) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventSink for AnalyticsQueueSink {
    fn emit(&self, envelope: &Envelope) {
        if self.tx.try_send(envelope.clone()).is_err() {
            tracing::trace!(name = %envelope.name, "analytics queue full, dropping event");
        }
    }
}
