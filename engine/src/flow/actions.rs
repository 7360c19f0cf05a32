//! Flow actions.
//!
//! Every transition of the booking state machine, user-driven and
//! effect-produced alike. Actions carrying a [`RequestTag`] or [`HoldId`]
//! use it to self-cancel when they arrive stale.

use super::state::RequestTag;
use crate::api::CheckoutSession;
use crate::availability::AvailabilityQuery;
use crate::error::ErrorCode;
use crate::types::{
    BookingKind, BookingRef, Customer, Experience, ExperienceId, Hold, HoldId, Money,
    PricingSnapshot, PromoStatus, Slot,
};
use chrono::NaiveDate;

/// All transitions of the booking flow.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowAction {
    /// Boot the flow: start the idle tick, resume the countdown for a
    /// restored hold, load the catalog.
    Start,

    // --- catalog & calendar -------------------------------------------------
    /// Load bookable experiences.
    LoadCatalog,
    /// Catalog arrived.
    CatalogLoaded {
        /// Experiences for the venue.
        experiences: Vec<Experience>,
    },
    /// Catalog load failed.
    CatalogFailed {
        /// Mapped error code.
        code: ErrorCode,
    },
    /// User picked an experience.
    SelectExperience {
        /// The chosen experience.
        experience_id: ExperienceId,
    },
    /// Load dates with availability for a month (`YYYY-MM`).
    LoadCalendar {
        /// Month to query.
        month: String,
    },
    /// Calendar arrived.
    CalendarLoaded {
        /// Dates with any availability.
        dates: Vec<NaiveDate>,
    },
    /// Calendar load failed.
    CalendarFailed {
        /// Mapped error code.
        code: ErrorCode,
    },

    // --- selection & availability -------------------------------------------
    /// User picked a date.
    SelectDate {
        /// The chosen date.
        date: NaiveDate,
    },
    /// User changed the party size. Invalidates any live hold first.
    SetPartySize {
        /// New party size.
        party_size: u32,
    },
    /// User switched public/private. Invalidates any live hold first.
    SetBookingKind {
        /// New booking kind.
        booking_kind: BookingKind,
    },
    /// Load slots for the current selection. `retried` marks the single
    /// delayed retry after a transient failure, which never retries again.
    LoadSlots {
        /// Whether this load is the retry.
        retried: bool,
    },
    /// Slots arrived.
    SlotsLoaded {
        /// Tag of the request that produced them.
        tag: RequestTag,
        /// The query they answer, for the cache.
        query: AvailabilityQuery,
        /// Ordered slot list.
        slots: Vec<Slot>,
    },
    /// Slot load failed.
    SlotsFailed {
        /// Tag of the failed request.
        tag: RequestTag,
        /// Mapped error code.
        code: ErrorCode,
        /// Whether the failed load was already the retry.
        retried: bool,
    },

    // --- hold lifecycle ------------------------------------------------------
    /// User picked a slot; reserve it.
    SelectSlot {
        /// The chosen slot.
        slot: Slot,
    },
    /// The reservation endpoint answered with a hold.
    HoldCreated {
        /// The new hold, pricing included.
        hold: Hold,
    },
    /// The reservation endpoint rejected the hold.
    HoldFailed {
        /// Mapped error code.
        code: ErrorCode,
    },
    /// Drop the live hold (user backed out, or a parameter change requires
    /// it). The server release is best-effort.
    InvalidateHold,
    /// One-second countdown tick, keyed to the hold it was scheduled for so
    /// stale ticks self-cancel.
    CountdownTick {
        /// The hold this tick belongs to.
        hold_id: HoldId,
    },

    // --- customer -------------------------------------------------------------
    /// Contact details changed.
    UpdateCustomer {
        /// New details, possibly still partial.
        customer: Customer,
    },

    // --- promo & gift card -----------------------------------------------------
    /// Validate a promo code standalone, independent of any hold.
    ValidatePromo {
        /// The entered code.
        code: String,
    },
    /// Promo validation answered.
    PromoChecked {
        /// The code that was checked.
        code: String,
        /// Resulting status.
        status: PromoStatus,
        /// Server message for rejected codes.
        message: Option<String>,
    },
    /// Apply the validated code to the live hold.
    ApplyPromo,
    /// The server applied the promo; the snapshot replaces the old one
    /// wholesale.
    PromoApplied {
        /// Hold the promo was applied to.
        hold_id: HoldId,
        /// The applied code.
        code: String,
        /// Recomputed authoritative pricing.
        pricing: PricingSnapshot,
    },
    /// Promo application failed.
    PromoFailed {
        /// Mapped error code.
        code: ErrorCode,
    },
    /// Look up a gift-card balance (read-only).
    CheckGiftCard {
        /// The entered code.
        code: String,
    },
    /// Balance lookup answered.
    GiftCardChecked {
        /// The checked code.
        code: String,
        /// Remaining balance.
        balance: Money,
    },
    /// Balance lookup failed.
    GiftCardFailed {
        /// Mapped error code.
        code: ErrorCode,
    },

    // --- checkout ---------------------------------------------------------------
    /// User pressed pay. Decision order: gift card fully covers → provider
    /// session → no-payment fallback.
    BeginCheckout,
    /// Payment session created.
    CheckoutSessionCreated {
        /// Hold being paid for.
        hold_id: HoldId,
        /// In-page secret or redirect URL.
        session: CheckoutSession,
    },
    /// The provider is unavailable or unconfigured; confirm without payment.
    /// Never surfaced as an error.
    PaymentUnavailable {
        /// Hold to confirm.
        hold_id: HoldId,
    },
    /// Checkout failed.
    CheckoutFailed {
        /// Mapped error code.
        code: ErrorCode,
    },
    /// The in-page payment element reported success; poll for confirmation.
    PaymentSucceeded,
    /// Booking confirmed, terminal.
    BookingConfirmed {
        /// The confirmed booking.
        booking: BookingRef,
    },
    /// The host recognized redirect-return URL markers.
    ResumeFromRedirect {
        /// Hold id carried through the URL.
        hold_id: HoldId,
        /// Whether the provider reported success.
        success: bool,
    },
    /// Poll the booking-status endpoint.
    PollBookingStatus {
        /// Hold being confirmed.
        hold_id: HoldId,
        /// Zero-based attempt counter.
        attempt: u32,
    },
    /// One poll answered.
    BookingStatusChecked {
        /// Hold being confirmed.
        hold_id: HoldId,
        /// The attempt that answered.
        attempt: u32,
        /// The booking, if confirmed.
        booking: Option<BookingRef>,
    },

    // --- housekeeping --------------------------------------------------------------
    /// Write the coalesced session snapshot.
    FlushSnapshot,
    /// User interacted; reset idle tracking.
    RecordActivity,
    /// One-second idle tick.
    IdleTick,
    /// Clear the surfaced error.
    DismissError,
    /// Start over after a confirmed booking.
    StartNewBooking,
}
