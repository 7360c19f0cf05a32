//! Flow state.
//!
//! One state type backs the whole booking surface. Every transition is an
//! enumerable action on this struct; no boolean-flag optimism, no UI-owned
//! business rules. The current step is always derived from which fields are
//! populated, never stored.

use crate::availability::AvailabilityCache;
use crate::config::FlowConfig;
use crate::error::ErrorCode;
use crate::persistence::{SessionSnapshot, SNAPSHOT_VERSION};
use crate::types::{
    BookingKind, BookingRef, Customer, Experience, ExperienceId, GiftCardApplication, Hold,
    HoldId, PromoApplication, SessionId, Slot, VenueId,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Monotonic tag distinguishing in-flight availability requests. A response
/// carrying anything but the newest tag is stale and discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTag(u64);

/// Where checkout stands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CheckoutStage {
    /// No checkout in progress.
    #[default]
    Idle,
    /// Payment-session creation in flight.
    CreatingSession,
    /// Hosted payment element is live with this secret.
    InPage {
        /// Provider client secret.
        client_secret: String,
    },
    /// A full-navigation redirect was issued; the process is about to die.
    RedirectIssued {
        /// Provider payment page.
        url: String,
    },
    /// Back from the provider, polling for confirmation.
    Polling {
        /// Zero-based attempt counter.
        attempt: u32,
    },
    /// Polling exhausted without confirmation. The booking may still confirm
    /// later outside the client's visibility.
    Pending,
}

/// The derived flow step, most advanced first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowStep {
    /// A booking exists.
    Confirmed,
    /// Waiting on post-payment confirmation.
    AwaitingConfirmation,
    /// Hold live, details complete, ready to pay.
    Checkout,
    /// Hold live, collecting contact details.
    Details,
    /// Picking a time.
    SlotSelection,
}

impl FlowStep {
    /// Telemetry name for the step.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Checkout => "checkout",
            Self::Details => "details",
            Self::SlotSelection => "slot_selection",
        }
    }
}

/// Complete state of one booking session.
#[derive(Clone, Debug)]
pub struct FlowState {
    /// Venue being booked.
    pub venue_id: VenueId,
    /// Identity of this client session.
    pub session_id: SessionId,

    /// Bookable experiences, once loaded.
    pub catalog: Vec<Experience>,
    /// Selected experience.
    pub selected_experience: Option<ExperienceId>,
    /// Dates with any availability for the loaded month.
    pub available_dates: Vec<NaiveDate>,
    /// Selected date.
    pub selected_date: Option<NaiveDate>,
    /// Public or private booking.
    pub booking_kind: BookingKind,
    /// Party size.
    pub party_size: u32,

    /// Currently displayed slots.
    pub slots: Vec<Slot>,
    /// Whether a foreground availability load is in flight. Mutually
    /// exclusive with `slots_error`.
    pub slots_loading: bool,
    /// Availability load failure, if the last load (and its retry) failed.
    pub slots_error: Option<ErrorCode>,
    /// Short-TTL availability cache.
    pub cache: AvailabilityCache,
    next_tag: u64,
    /// Tag of the newest availability request; responses with any other tag
    /// are discarded.
    pub current_slots_request: Option<RequestTag>,

    /// The single active hold, if any.
    pub hold: Option<Hold>,
    /// Advisory lock: a hold-mutating call is in flight, so the triggering
    /// actions are ignored until it lands.
    pub hold_in_flight: bool,
    /// Seconds left on the countdown as of the last tick.
    pub countdown_seconds: Option<i64>,

    /// Promo state, scoped to the current hold.
    pub promo: PromoApplication,
    /// Checked gift card.
    pub gift_card: Option<GiftCardApplication>,
    /// Contact details collected so far.
    pub customer: Customer,

    /// Checkout progress.
    pub checkout: CheckoutStage,
    /// Confirmed booking, terminal.
    pub booking: Option<BookingRef>,
    /// Hold awaiting confirmation across a payment redirect.
    pub pending_redirect: Option<HoldId>,

    /// Error surfaced to the user, always from the closed vocabulary.
    pub error: Option<ErrorCode>,

    /// Snapshot bookkeeping: state changed since the last write.
    pub snapshot_dirty: bool,
    /// Snapshot bookkeeping: a coalesced flush is already scheduled.
    pub flush_scheduled: bool,

    /// Last user interaction.
    pub last_activity: DateTime<Utc>,
    /// The idle event already fired for the current inactivity span.
    pub idle_notified: bool,
    /// Idle tracking tick is running.
    pub idle_tracking: bool,
}

impl FlowState {
    /// Fresh state for a venue.
    #[must_use]
    pub fn new(venue_id: VenueId, config: &FlowConfig, now: DateTime<Utc>) -> Self {
        Self {
            venue_id,
            session_id: SessionId::new(),
            catalog: Vec::new(),
            selected_experience: None,
            available_dates: Vec::new(),
            selected_date: None,
            booking_kind: BookingKind::default(),
            party_size: 2,
            slots: Vec::new(),
            slots_loading: false,
            slots_error: None,
            cache: AvailabilityCache::new(config.availability_ttl),
            next_tag: 0,
            current_slots_request: None,
            hold: None,
            hold_in_flight: false,
            countdown_seconds: None,
            promo: PromoApplication::default(),
            gift_card: None,
            customer: Customer::default(),
            checkout: CheckoutStage::default(),
            booking: None,
            pending_redirect: None,
            error: None,
            snapshot_dirty: false,
            flush_scheduled: false,
            last_activity: now,
            idle_notified: false,
            idle_tracking: false,
        }
    }

    /// Rebuild state from a persisted snapshot. Expired holds (and the promo
    /// and gift-card state scoped to them) are discarded before anything
    /// else; the step then derives from what survived.
    #[must_use]
    pub fn from_snapshot(snapshot: SessionSnapshot, config: &FlowConfig, now: DateTime<Utc>) -> Self {
        let snapshot = snapshot.sanitized(now);
        let mut state = Self::new(snapshot.venue_id, config, now);
        state.session_id = snapshot.session_id;
        state.selected_experience = snapshot.selected_experience;
        state.selected_date = snapshot.selected_date;
        state.booking_kind = snapshot.booking_kind;
        state.party_size = snapshot.party_size;
        state.hold = snapshot.hold;
        state.promo = snapshot.promo;
        state.gift_card = snapshot.gift_card;
        state.customer = snapshot.customer;
        state.booking = snapshot.booking;
        state.pending_redirect = snapshot.pending_redirect;
        if let Some(hold) = &state.hold {
            state.countdown_seconds = Some(hold.remaining_seconds(now));
        }
        state
    }

    /// Serialize for persistence.
    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            venue_id: self.venue_id,
            session_id: self.session_id,
            selected_experience: self.selected_experience,
            selected_date: self.selected_date,
            booking_kind: self.booking_kind,
            party_size: self.party_size,
            hold: self.hold.clone(),
            promo: self.promo.clone(),
            gift_card: self.gift_card.clone(),
            customer: self.customer.clone(),
            booking: self.booking.clone(),
            pending_redirect: self.pending_redirect,
            saved_at: now,
        }
    }

    /// Allocate the next availability request tag and make it current.
    pub fn next_request_tag(&mut self) -> RequestTag {
        self.next_tag += 1;
        let tag = RequestTag(self.next_tag);
        self.current_slots_request = Some(tag);
        tag
    }

    /// Derive the current step from populated fields, most advanced first.
    /// A persisted step is never consulted.
    #[must_use]
    pub fn step(&self) -> FlowStep {
        if self.booking.is_some() {
            return FlowStep::Confirmed;
        }
        if self.pending_redirect.is_some()
            || matches!(self.checkout, CheckoutStage::Polling { .. } | CheckoutStage::Pending)
        {
            return FlowStep::AwaitingConfirmation;
        }
        if self.hold.is_some() {
            if self.customer.validate().is_ok() {
                return FlowStep::Checkout;
            }
            return FlowStep::Details;
        }
        FlowStep::SlotSelection
    }

    /// Clear the hold and everything scoped to it: pricing (inside the
    /// hold), promo, gift card, countdown, checkout progress, redirect
    /// marker. These always reset together, never independently.
    pub fn clear_hold_scope(&mut self) {
        self.hold = None;
        self.countdown_seconds = None;
        self.promo = PromoApplication::default();
        self.gift_card = None;
        self.checkout = CheckoutStage::Idle;
        self.pending_redirect = None;
    }
}
