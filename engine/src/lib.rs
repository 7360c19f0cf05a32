//! # Bookflow Engine
//!
//! The booking-hold flow engine: a headless state machine that takes a user
//! from picking a time slot, through a server-tracked hold with an advisory
//! countdown, to a paid (or payment-free) confirmed booking.
//!
//! All business rules live in [`flow::BookingFlowReducer`]; every side effect
//! is an explicit [`Effect`](bookflow_core::effect::Effect) description
//! executed by the [`bookflow_runtime::Store`]. Hosts attach rendering as a
//! thin adapter over the store:
//!
//! ```ignore
//! let env = FlowEnvironment::new(api, sessions, clock, sink, config.clone());
//! let store = booking_store(FlowState::new(venue_id, &config, clock.now()), env);
//! store.send(FlowAction::Start).await?;
//! ```
//!
//! ## Guarantees
//!
//! - At most one active hold per session; replacing it clears everything
//!   scoped to it (pricing, promo, gift card, checkout progress) together.
//! - Pricing is server-authoritative: snapshots are replaced wholesale, the
//!   client never derives a total.
//! - Superseded availability responses and countdown ticks self-cancel via
//!   request tags and hold ids.
//! - Session snapshots are written on a coalesced debounce and sanitized on
//!   restore; an expired hold is never revived.

pub mod api;
pub mod availability;
pub mod config;
pub mod error;
pub mod flow;
pub mod persistence;
pub mod telemetry;
pub mod types;

pub use api::{BookingApi, HttpBookingApi};
pub use config::FlowConfig;
pub use error::{ApiError, ErrorClass, ErrorCode};
pub use flow::{BookingFlowReducer, FlowAction, FlowEnvironment, FlowState, FlowStep};

/// The fully wired store type hosts embed.
pub type BookingStore =
    bookflow_runtime::Store<FlowState, FlowAction, FlowEnvironment, BookingFlowReducer>;

/// Assemble a store around the booking flow reducer.
#[must_use]
pub fn booking_store(state: FlowState, environment: FlowEnvironment) -> BookingStore {
    BookingStore::new(state, BookingFlowReducer, environment)
}
