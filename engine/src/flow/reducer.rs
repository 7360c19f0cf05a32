//! The booking flow reducer.
//!
//! Pure state transitions plus effect descriptions; all I/O happens in the
//! returned effects and re-enters as actions. Request tags, hold-keyed
//! ticks, and the advisory in-flight flag keep superseded work from
//! overwriting fresher state.

use super::actions::FlowAction;
use super::environment::FlowEnvironment;
use super::state::{CheckoutStage, FlowState, FlowStep, RequestTag};
use crate::api::{wire, BookingState, CheckoutSession};
use crate::availability::{AvailabilityQuery, CacheLookup};
use crate::error::{ErrorClass, ErrorCode};
use crate::persistence;
use crate::telemetry::{self, FlowEvent};
use crate::types::{
    BookingId, BookingRef, Customer, ExperienceId, GiftCardApplication, Hold, HoldId, HoldStatus,
    PricingSnapshot, PromoApplication, PromoStatus, Slot,
};
use bookflow_core::effect::Effect;
use bookflow_core::reducer::{Effects, Reducer};
use bookflow_core::smallvec;
use chrono::NaiveDate;
use std::sync::Arc;

/// The single reducer behind the booking surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingFlowReducer;

impl Reducer for BookingFlowReducer {
    type State = FlowState;
    type Action = FlowAction;
    type Environment = FlowEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Action> {
        match action {
            FlowAction::Start => start(state, env),

            FlowAction::LoadCatalog => load_catalog(state, env),
            FlowAction::CatalogLoaded { experiences } => {
                state.catalog = experiences;
                smallvec![]
            },
            FlowAction::CatalogFailed { code } | FlowAction::CalendarFailed { code } => {
                surface(state, env, code);
                smallvec![]
            },
            FlowAction::SelectExperience { experience_id } => {
                select_experience(state, env, experience_id)
            },
            FlowAction::LoadCalendar { month } => load_calendar(state, env, month),
            FlowAction::CalendarLoaded { dates } => {
                state.available_dates = dates;
                smallvec![]
            },

            FlowAction::SelectDate { date } => select_date(state, env, date),
            FlowAction::SetPartySize { party_size } => {
                change_parameters(state, env, |s| s.party_size = party_size)
            },
            FlowAction::SetBookingKind { booking_kind } => {
                change_parameters(state, env, |s| s.booking_kind = booking_kind)
            },
            FlowAction::LoadSlots { retried } => load_slots(state, env, retried),
            FlowAction::SlotsLoaded { tag, query, slots } => {
                slots_loaded(state, env, tag, query, slots)
            },
            FlowAction::SlotsFailed { tag, code, retried } => {
                slots_failed(state, env, tag, code, retried)
            },

            FlowAction::SelectSlot { slot } => select_slot(state, env, slot),
            FlowAction::HoldCreated { hold } => hold_created(state, env, hold),
            FlowAction::HoldFailed { code } => hold_failed(state, env, code),
            FlowAction::InvalidateHold => invalidate_hold(state, env),
            FlowAction::CountdownTick { hold_id } => countdown_tick(state, env, hold_id),

            FlowAction::UpdateCustomer { customer } => update_customer(state, env, customer),

            FlowAction::ValidatePromo { code } => validate_promo(state, env, code),
            FlowAction::PromoChecked { code, status, message } => {
                promo_checked(state, code, status, message)
            },
            FlowAction::ApplyPromo => apply_promo(state, env),
            FlowAction::PromoApplied { hold_id, code, pricing } => {
                promo_applied(state, env, hold_id, code, pricing)
            },
            FlowAction::PromoFailed { code } => promo_failed(state, env, code),
            FlowAction::CheckGiftCard { code } => check_gift_card(state, env, code),
            FlowAction::GiftCardChecked { code, balance } => {
                state.gift_card = Some(GiftCardApplication {
                    code,
                    remaining_balance: balance,
                });
                let mut effects = smallvec![];
                schedule_flush(state, env, &mut effects);
                effects
            },
            FlowAction::GiftCardFailed { code } => {
                surface(state, env, code);
                smallvec![]
            },

            FlowAction::BeginCheckout => begin_checkout(state, env),
            FlowAction::CheckoutSessionCreated { hold_id, session } => {
                checkout_session_created(state, env, hold_id, session)
            },
            FlowAction::PaymentUnavailable { hold_id } => {
                payment_unavailable(state, env, hold_id)
            },
            FlowAction::CheckoutFailed { code } => checkout_failed(state, env, code),
            FlowAction::PaymentSucceeded => payment_succeeded(state),
            FlowAction::BookingConfirmed { booking } => booking_confirmed(state, env, booking),
            FlowAction::ResumeFromRedirect { hold_id, success } => {
                resume_from_redirect(state, env, hold_id, success)
            },
            FlowAction::PollBookingStatus { hold_id, attempt } => {
                poll_booking_status(state, env, hold_id, attempt)
            },
            FlowAction::BookingStatusChecked { hold_id, attempt, booking } => {
                booking_status_checked(state, env, hold_id, attempt, booking)
            },

            FlowAction::FlushSnapshot => flush_snapshot(state, env),
            FlowAction::RecordActivity => {
                state.last_activity = env.clock.now();
                state.idle_notified = false;
                smallvec![]
            },
            FlowAction::IdleTick => idle_tick(state, env),
            FlowAction::DismissError => {
                state.error = None;
                smallvec![]
            },
            FlowAction::StartNewBooking => start_new_booking(state, env),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn note(env: &FlowEnvironment, event: &FlowEvent) {
    telemetry::emit(env.sink.as_ref(), event);
}

/// Feed an action straight back through the store.
fn dispatch(action: FlowAction) -> Effect<FlowAction> {
    Effect::future(async move { Some(action) })
}

/// Mark state dirty and make sure exactly one coalesced flush is scheduled.
fn schedule_flush(state: &mut FlowState, env: &FlowEnvironment, effects: &mut Effects<FlowAction>) {
    state.snapshot_dirty = true;
    if !state.flush_scheduled {
        state.flush_scheduled = true;
        effects.push(Effect::delay(
            env.config.snapshot_debounce,
            FlowAction::FlushSnapshot,
        ));
    }
}

fn surface(state: &mut FlowState, env: &FlowEnvironment, code: ErrorCode) {
    state.error = Some(code);
    note(env, &FlowEvent::Error { code });
}

/// Best-effort server-side release; the flow never waits on it.
fn release_hold(env: &FlowEnvironment, hold_id: HoldId) -> Effect<FlowAction> {
    let api = Arc::clone(&env.api);
    Effect::future(async move {
        if let Err(err) = api.release_hold(hold_id).await {
            tracing::debug!(%hold_id, error = %err, "hold release failed");
        }
        None
    })
}

/// A conflict proved local state stale: drop the hold and its scope, drop
/// the cache, and send the user back to the picker with fresh slots.
fn handle_conflict(
    state: &mut FlowState,
    env: &FlowEnvironment,
    code: ErrorCode,
) -> Effects<FlowAction> {
    state.clear_hold_scope();
    state.cache.clear();
    surface(state, env, code);
    note(env, &FlowEvent::View { step: FlowStep::SlotSelection.as_str() });
    let mut effects = smallvec![dispatch(FlowAction::LoadSlots { retried: false })];
    schedule_flush(state, env, &mut effects);
    effects
}

fn fetch_slots(
    env: &FlowEnvironment,
    query: AvailabilityQuery,
    tag: RequestTag,
    retried: bool,
) -> Effect<FlowAction> {
    let api = Arc::clone(&env.api);
    Effect::future(async move {
        match api.fetch_availability(&query).await {
            Ok(slots) => Some(FlowAction::SlotsLoaded { tag, query, slots }),
            Err(err) => Some(FlowAction::SlotsFailed {
                tag,
                code: err.code(),
                retried,
            }),
        }
    })
}

fn current_query(state: &FlowState) -> Option<AvailabilityQuery> {
    Some(AvailabilityQuery {
        venue_id: state.venue_id,
        experience_id: state.selected_experience?,
        date: state.selected_date?,
        booking_kind: state.booking_kind,
        party_size: state.party_size,
    })
}

// ============================================================================
// Boot, catalog, calendar
// ============================================================================

fn start(state: &mut FlowState, env: &FlowEnvironment) -> Effects<FlowAction> {
    state.idle_tracking = true;
    state.last_activity = env.clock.now();
    note(env, &FlowEvent::View { step: state.step().as_str() });

    let mut effects: Effects<FlowAction> =
        smallvec![Effect::delay(env.config.tick_interval, FlowAction::IdleTick)];

    // A restored hold needs its countdown running again.
    if let Some(hold) = &state.hold {
        if hold.status == HoldStatus::Active {
            effects.push(Effect::delay(
                env.config.tick_interval,
                FlowAction::CountdownTick { hold_id: hold.hold_id },
            ));
        }
    }

    if state.catalog.is_empty() {
        effects.push(dispatch(FlowAction::LoadCatalog));
    }

    effects
}

fn load_catalog(state: &FlowState, env: &FlowEnvironment) -> Effects<FlowAction> {
    note(env, &FlowEvent::Request { name: "catalog" });
    let api = Arc::clone(&env.api);
    let venue = state.venue_id;
    smallvec![Effect::future(async move {
        match api.fetch_catalog(venue).await {
            Ok(experiences) => Some(FlowAction::CatalogLoaded { experiences }),
            Err(err) => Some(FlowAction::CatalogFailed { code: err.code() }),
        }
    })]
}

fn select_experience(
    state: &mut FlowState,
    env: &FlowEnvironment,
    experience_id: ExperienceId,
) -> Effects<FlowAction> {
    change_parameters(state, env, |s| {
        s.selected_experience = Some(experience_id);
        s.slots.clear();
    })
}

fn load_calendar(state: &FlowState, env: &FlowEnvironment, month: String) -> Effects<FlowAction> {
    let Some(experience) = state.selected_experience else {
        return smallvec![];
    };
    note(env, &FlowEvent::Request { name: "calendar" });
    let api = Arc::clone(&env.api);
    let venue = state.venue_id;
    smallvec![Effect::future(async move {
        match api.fetch_calendar(venue, experience, &month).await {
            Ok(dates) => Some(FlowAction::CalendarLoaded { dates }),
            Err(err) => Some(FlowAction::CalendarFailed { code: err.code() }),
        }
    })]
}

// ============================================================================
// Selection & availability
// ============================================================================

fn select_date(state: &mut FlowState, env: &FlowEnvironment, date: NaiveDate) -> Effects<FlowAction> {
    state.selected_date = Some(date);
    state.last_activity = env.clock.now();
    state.idle_notified = false;
    let mut effects = smallvec![dispatch(FlowAction::LoadSlots { retried: false })];
    schedule_flush(state, env, &mut effects);
    effects
}

/// Apply a booking-parameter change, invalidating any live hold *before*
/// the change becomes visible so a stale configuration can never be paid
/// for.
fn change_parameters(
    state: &mut FlowState,
    env: &FlowEnvironment,
    apply: impl FnOnce(&mut FlowState),
) -> Effects<FlowAction> {
    let mut effects: Effects<FlowAction> = smallvec![];

    if let Some(hold) = state.hold.take() {
        state.clear_hold_scope();
        effects.push(release_hold(env, hold.hold_id));
    }

    apply(state);

    if state.selected_date.is_some() && state.selected_experience.is_some() {
        effects.push(dispatch(FlowAction::LoadSlots { retried: false }));
    }
    schedule_flush(state, env, &mut effects);
    effects
}

fn load_slots(state: &mut FlowState, env: &FlowEnvironment, retried: bool) -> Effects<FlowAction> {
    let Some(query) = current_query(state) else {
        return smallvec![];
    };

    // The retry IS the refresh: fetch unconditionally and never retry again.
    if retried {
        let tag = state.next_request_tag();
        note(env, &FlowEvent::Request { name: "availability" });
        return smallvec![fetch_slots(env, query, tag, true)];
    }

    match state.cache.lookup(&query, env.clock.now()) {
        CacheLookup::Fresh(slots) => {
            state.slots = slots;
            state.slots_loading = false;
            state.slots_error = None;
            smallvec![]
        },
        CacheLookup::Stale(slots) => {
            // Serve stale immediately, refresh in the background.
            state.slots = slots;
            state.slots_loading = false;
            state.slots_error = None;
            let tag = state.next_request_tag();
            note(env, &FlowEvent::Request { name: "availability" });
            smallvec![fetch_slots(env, query, tag, false)]
        },
        CacheLookup::Miss => {
            state.slots_loading = true;
            state.slots_error = None;
            let tag = state.next_request_tag();
            note(env, &FlowEvent::Request { name: "availability" });
            smallvec![fetch_slots(env, query, tag, false)]
        },
    }
}

fn slots_loaded(
    state: &mut FlowState,
    env: &FlowEnvironment,
    tag: RequestTag,
    query: AvailabilityQuery,
    slots: Vec<Slot>,
) -> Effects<FlowAction> {
    // A superseded request must not overwrite fresher state.
    if state.current_slots_request != Some(tag) {
        return smallvec![];
    }
    state.current_slots_request = None;
    state.slots_loading = false;
    state.slots_error = None;
    state.cache.insert(query, slots.clone(), env.clock.now());
    state.slots = slots;
    smallvec![]
}

fn slots_failed(
    state: &mut FlowState,
    env: &FlowEnvironment,
    tag: RequestTag,
    code: ErrorCode,
    retried: bool,
) -> Effects<FlowAction> {
    if state.current_slots_request != Some(tag) {
        return smallvec![];
    }
    state.current_slots_request = None;

    if code.class() == ErrorClass::Transient && !retried {
        return smallvec![Effect::delay(
            env.config.retry_delay,
            FlowAction::LoadSlots { retried: true },
        )];
    }

    state.slots_loading = false;
    state.slots_error = Some(code);
    note(env, &FlowEvent::Error { code });
    smallvec![]
}

// ============================================================================
// Hold lifecycle
// ============================================================================

fn select_slot(state: &mut FlowState, env: &FlowEnvironment, slot: Slot) -> Effects<FlowAction> {
    // Advisory lock: one hold-mutating call at a time.
    if state.hold_in_flight || state.booking.is_some() {
        return smallvec![];
    }
    if !slot.available {
        surface(state, env, ErrorCode::SlotUnavailable);
        return smallvec![];
    }
    if let Some(experience) = state
        .catalog
        .iter()
        .find(|e| Some(e.id) == state.selected_experience)
    {
        if state.party_size < experience.min_party_size
            || state.party_size > experience.max_party_size
        {
            surface(state, env, ErrorCode::InvalidPartySize);
            return smallvec![];
        }
    }

    let mut effects: Effects<FlowAction> = smallvec![];

    // At most one active hold: the previous one goes first, together with
    // everything scoped to it.
    if let Some(previous) = state.hold.take() {
        state.clear_hold_scope();
        effects.push(release_hold(env, previous.hold_id));
    }

    state.hold_in_flight = true;
    state.error = None;
    note(env, &FlowEvent::SlotSelected { start_at: slot.start_at });
    note(env, &FlowEvent::Request { name: "create_hold" });

    let api = Arc::clone(&env.api);
    let party_size = state.party_size;
    let booking_kind = state.booking_kind;
    let customer = partial_customer(&state.customer);
    let created_at = env.clock.now();

    effects.push(Effect::future(async move {
        let request = wire::CreateHoldRequest {
            resource_id: slot.resource_id,
            start_at: slot.start_at,
            end_at: slot.end_at,
            party_size,
            booking_kind,
            customer,
        };
        match api.create_hold(&request).await {
            Ok(response) => Some(FlowAction::HoldCreated {
                hold: Hold {
                    hold_id: response.hold_id,
                    resource_id: slot.resource_id,
                    start_at: slot.start_at,
                    end_at: slot.end_at,
                    party_size,
                    booking_kind,
                    status: HoldStatus::Active,
                    created_at,
                    expires_at: response.expires_at,
                    pricing: response.pricing,
                },
            }),
            Err(err) => Some(FlowAction::HoldFailed { code: err.code() }),
        }
    }));

    schedule_flush(state, env, &mut effects);
    effects
}

fn partial_customer(customer: &Customer) -> Option<Customer> {
    let any = !customer.name.is_empty() || !customer.phone.is_empty() || !customer.email.is_empty();
    any.then(|| customer.clone())
}

fn hold_created(state: &mut FlowState, env: &FlowEnvironment, hold: Hold) -> Effects<FlowAction> {
    state.hold_in_flight = false;
    state.countdown_seconds = Some(hold.remaining_seconds(env.clock.now()));
    let hold_id = hold.hold_id;
    note(env, &FlowEvent::HoldCreated { hold_id, expires_at: hold.expires_at });
    state.hold = Some(hold);
    note(env, &FlowEvent::View { step: state.step().as_str() });

    let mut effects: Effects<FlowAction> = smallvec![Effect::delay(
        env.config.tick_interval,
        FlowAction::CountdownTick { hold_id },
    )];
    schedule_flush(state, env, &mut effects);
    effects
}

fn hold_failed(state: &mut FlowState, env: &FlowEnvironment, code: ErrorCode) -> Effects<FlowAction> {
    state.hold_in_flight = false;
    match code.class() {
        // The slot was stale: clear selection and re-fetch availability.
        ErrorClass::Conflict => handle_conflict(state, env, code),
        // Hold creation is never auto-retried; a double hold costs more
        // than a second click.
        _ => {
            surface(state, env, code);
            smallvec![]
        },
    }
}

fn invalidate_hold(state: &mut FlowState, env: &FlowEnvironment) -> Effects<FlowAction> {
    let Some(hold) = state.hold.take() else {
        return smallvec![];
    };
    state.clear_hold_scope();
    let mut effects = smallvec![release_hold(env, hold.hold_id)];
    schedule_flush(state, env, &mut effects);
    effects
}

fn countdown_tick(
    state: &mut FlowState,
    env: &FlowEnvironment,
    hold_id: HoldId,
) -> Effects<FlowAction> {
    // A tick for a hold that no longer exists self-cancels.
    let Some(hold) = &state.hold else {
        return smallvec![];
    };
    if hold.hold_id != hold_id || hold.status != HoldStatus::Active {
        return smallvec![];
    }

    let remaining = hold.remaining_seconds(env.clock.now());
    state.countdown_seconds = Some(remaining);

    if remaining > 0 {
        return smallvec![Effect::delay(
            env.config.tick_interval,
            FlowAction::CountdownTick { hold_id },
        )];
    }

    // Expired: pricing, promo, and selection clear together and the flow
    // returns to time-selection with fresh slots.
    note(env, &FlowEvent::HoldExpired { hold_id });
    state.clear_hold_scope();
    surface(state, env, ErrorCode::HoldExpired);
    note(env, &FlowEvent::View { step: FlowStep::SlotSelection.as_str() });
    let mut effects = smallvec![dispatch(FlowAction::LoadSlots { retried: false })];
    schedule_flush(state, env, &mut effects);
    effects
}

// ============================================================================
// Customer
// ============================================================================

fn update_customer(
    state: &mut FlowState,
    env: &FlowEnvironment,
    customer: Customer,
) -> Effects<FlowAction> {
    state.customer = customer;
    state.last_activity = env.clock.now();
    state.idle_notified = false;
    let mut effects = smallvec![];
    schedule_flush(state, env, &mut effects);
    effects
}

// ============================================================================
// Promotions & gift cards
// ============================================================================

fn validate_promo(state: &mut FlowState, env: &FlowEnvironment, code: String) -> Effects<FlowAction> {
    state.promo = PromoApplication {
        code: code.clone(),
        status: PromoStatus::Checking,
        message: None,
        applied_code: state.promo.applied_code.clone(),
    };
    note(env, &FlowEvent::Request { name: "promo_check" });

    let api = Arc::clone(&env.api);
    smallvec![Effect::future(async move {
        match api.check_promo(&code).await {
            Ok(response) => {
                let status = if !response.valid {
                    PromoStatus::Invalid
                } else if response.supported {
                    PromoStatus::Valid
                } else {
                    PromoStatus::Unsupported
                };
                Some(FlowAction::PromoChecked {
                    code,
                    status,
                    message: response.message,
                })
            },
            Err(err) => Some(FlowAction::PromoFailed { code: err.code() }),
        }
    })]
}

fn promo_checked(
    state: &mut FlowState,
    code: String,
    status: PromoStatus,
    message: Option<String>,
) -> Effects<FlowAction> {
    // Superseded by a newer entry.
    if state.promo.code != code {
        return smallvec![];
    }
    state.promo.status = status;
    state.promo.message = message;

    // Phase two: a valid code applies to the live hold automatically.
    if status == PromoStatus::Valid && state.hold.is_some() {
        return smallvec![dispatch(FlowAction::ApplyPromo)];
    }
    smallvec![]
}

fn apply_promo(state: &mut FlowState, env: &FlowEnvironment) -> Effects<FlowAction> {
    let Some(hold) = &state.hold else {
        return smallvec![];
    };
    if state.promo.status != PromoStatus::Valid {
        return smallvec![];
    }
    let code = state.promo.code.clone();
    // Re-applying the applied code yields the same total by definition; skip
    // the round trip.
    if state.promo.applied_code.as_deref() == Some(code.as_str()) {
        return smallvec![];
    }

    let hold_id = hold.hold_id;
    note(env, &FlowEvent::Request { name: "apply_promo" });
    let api = Arc::clone(&env.api);
    smallvec![Effect::future(async move {
        match api.apply_promo(hold_id, &code).await {
            Ok(pricing) => Some(FlowAction::PromoApplied { hold_id, code, pricing }),
            Err(err) => Some(FlowAction::PromoFailed { code: err.code() }),
        }
    })]
}

fn promo_applied(
    state: &mut FlowState,
    env: &FlowEnvironment,
    hold_id: HoldId,
    code: String,
    pricing: PricingSnapshot,
) -> Effects<FlowAction> {
    // Stale if the hold was replaced while the request was in flight.
    let Some(hold) = &mut state.hold else {
        return smallvec![];
    };
    if hold.hold_id != hold_id {
        return smallvec![];
    }

    // Wholesale replacement, never client arithmetic.
    hold.pricing = pricing;
    note(env, &FlowEvent::PromoApplied { code: code.clone() });
    state.promo.applied_code = Some(code);
    let mut effects = smallvec![];
    schedule_flush(state, env, &mut effects);
    effects
}

fn promo_failed(state: &mut FlowState, env: &FlowEnvironment, code: ErrorCode) -> Effects<FlowAction> {
    match code {
        ErrorCode::InvalidPromoCode => {
            state.promo.status = PromoStatus::Invalid;
            state.promo.message = Some(code.user_message().to_owned());
            smallvec![]
        },
        ErrorCode::PromoNotSupported => {
            state.promo.status = PromoStatus::Unsupported;
            state.promo.message = Some(code.user_message().to_owned());
            smallvec![]
        },
        ErrorCode::HoldExpired => handle_conflict(state, env, code),
        _ => {
            state.promo.status = PromoStatus::Idle;
            surface(state, env, code);
            smallvec![]
        },
    }
}

fn check_gift_card(state: &mut FlowState, env: &FlowEnvironment, code: String) -> Effects<FlowAction> {
    state.last_activity = env.clock.now();
    note(env, &FlowEvent::Request { name: "gift_card_check" });
    let api = Arc::clone(&env.api);
    smallvec![Effect::future(async move {
        match api.check_gift_card(&code).await {
            Ok(balance) => Some(FlowAction::GiftCardChecked { code, balance }),
            Err(err) => Some(FlowAction::GiftCardFailed { code: err.code() }),
        }
    })]
}

// ============================================================================
// Checkout
// ============================================================================

fn begin_checkout(state: &mut FlowState, env: &FlowEnvironment) -> Effects<FlowAction> {
    let Some(hold) = &state.hold else {
        return smallvec![];
    };
    if hold.status != HoldStatus::Active || state.checkout != CheckoutStage::Idle {
        return smallvec![];
    }
    if let Err(code) = state.customer.validate() {
        surface(state, env, code);
        return smallvec![];
    }
    // Reconcile the advisory countdown with the authoritative expiry before
    // taking money.
    let hold_id = hold.hold_id;
    if hold.is_expired(env.clock.now()) {
        return smallvec![dispatch(FlowAction::CountdownTick { hold_id })];
    }

    let total = hold.pricing.total;
    let customer = state.customer.clone();
    state.error = None;
    state.checkout = CheckoutStage::CreatingSession;
    let mut effects: Effects<FlowAction> = smallvec![];

    // Decision 1: a fully covering gift card skips payment entirely.
    if let Some(card) = &state.gift_card {
        if card.covers(total) {
            note(env, &FlowEvent::CheckoutStarted { method: "gift_card" });
            let api = Arc::clone(&env.api);
            let redeem = wire::RedeemGiftCardRequest {
                code: card.code.clone(),
                hold_id,
                amount: card.redeemable_against(total),
            };
            effects.push(Effect::future(async move {
                if let Err(err) = api.redeem_gift_card(&redeem).await {
                    return Some(FlowAction::CheckoutFailed { code: err.code() });
                }
                let confirm = wire::ConfirmBookingRequest { hold_id, customer };
                match api.confirm_booking(&confirm).await {
                    Ok(response) => Some(FlowAction::BookingConfirmed {
                        booking: BookingRef {
                            booking_id: response.booking_id,
                            summary: response.summary,
                            payment_collected: true,
                        },
                    }),
                    Err(err) => Some(FlowAction::CheckoutFailed { code: err.code() }),
                }
            }));
            schedule_flush(state, env, &mut effects);
            return effects;
        }
    }

    // Decision 2: provider session. Decision 3 (no provider) comes back as
    // PaymentUnavailable and never as an error.
    note(env, &FlowEvent::Request { name: "checkout_create" });
    let api = Arc::clone(&env.api);
    let request = wire::CreateCheckoutRequest {
        hold_id,
        customer,
        gift_card_code: state.gift_card.as_ref().map(|card| card.code.clone()),
    };
    effects.push(Effect::future(async move {
        match api.create_checkout(&request).await {
            Ok(session) => Some(FlowAction::CheckoutSessionCreated { hold_id, session }),
            Err(err) if err.code() == ErrorCode::PaymentNotConfigured => {
                Some(FlowAction::PaymentUnavailable { hold_id })
            },
            Err(err) => Some(FlowAction::CheckoutFailed { code: err.code() }),
        }
    }));
    schedule_flush(state, env, &mut effects);
    effects
}

fn checkout_hold_matches(state: &FlowState, hold_id: HoldId) -> bool {
    state
        .hold
        .as_ref()
        .is_some_and(|hold| hold.hold_id == hold_id)
        && state.checkout == CheckoutStage::CreatingSession
}

fn checkout_session_created(
    state: &mut FlowState,
    env: &FlowEnvironment,
    hold_id: HoldId,
    session: CheckoutSession,
) -> Effects<FlowAction> {
    if !checkout_hold_matches(state, hold_id) {
        return smallvec![];
    }
    match session {
        CheckoutSession::InPage { client_secret } => {
            state.checkout = CheckoutStage::InPage { client_secret };
            note(env, &FlowEvent::CheckoutStarted { method: "in_page" });
            let mut effects = smallvec![];
            schedule_flush(state, env, &mut effects);
            effects
        },
        CheckoutSession::Redirect { url } => {
            state.checkout = CheckoutStage::RedirectIssued { url };
            state.pending_redirect = Some(hold_id);
            note(env, &FlowEvent::CheckoutStarted { method: "redirect" });
            // The process dies at navigation; persist immediately, not on
            // the debounce.
            state.snapshot_dirty = true;
            smallvec![dispatch(FlowAction::FlushSnapshot)]
        },
    }
}

fn payment_unavailable(
    state: &mut FlowState,
    env: &FlowEnvironment,
    hold_id: HoldId,
) -> Effects<FlowAction> {
    if !checkout_hold_matches(state, hold_id) {
        return smallvec![];
    }
    note(env, &FlowEvent::CheckoutStarted { method: "no_payment" });
    let api = Arc::clone(&env.api);
    let customer = state.customer.clone();
    smallvec![Effect::future(async move {
        let confirm = wire::ConfirmBookingRequest { hold_id, customer };
        match api.confirm_booking(&confirm).await {
            Ok(response) => Some(FlowAction::BookingConfirmed {
                booking: BookingRef {
                    booking_id: response.booking_id,
                    summary: response.summary,
                    payment_collected: false,
                },
            }),
            Err(err) => Some(FlowAction::CheckoutFailed { code: err.code() }),
        }
    })]
}

fn checkout_failed(state: &mut FlowState, env: &FlowEnvironment, code: ErrorCode) -> Effects<FlowAction> {
    state.checkout = CheckoutStage::Idle;
    if code.class() == ErrorClass::Conflict {
        return handle_conflict(state, env, code);
    }
    surface(state, env, code);
    let mut effects = smallvec![];
    schedule_flush(state, env, &mut effects);
    effects
}

fn payment_succeeded(state: &mut FlowState) -> Effects<FlowAction> {
    let Some(hold) = &state.hold else {
        return smallvec![];
    };
    if !matches!(state.checkout, CheckoutStage::InPage { .. }) {
        return smallvec![];
    }
    let hold_id = hold.hold_id;
    state.checkout = CheckoutStage::Polling { attempt: 0 };
    smallvec![dispatch(FlowAction::PollBookingStatus { hold_id, attempt: 0 })]
}

fn booking_confirmed(
    state: &mut FlowState,
    env: &FlowEnvironment,
    booking: BookingRef,
) -> Effects<FlowAction> {
    if state.booking.is_some() {
        return smallvec![];
    }
    if let Some(hold) = &mut state.hold {
        hold.status = HoldStatus::Consumed;
    }
    state.countdown_seconds = None;
    state.pending_redirect = None;
    state.checkout = CheckoutStage::Idle;
    state.error = None;
    note(env, &FlowEvent::Confirmed { booking_id: booking.booking_id.clone() });
    state.booking = Some(booking);
    note(env, &FlowEvent::View { step: FlowStep::Confirmed.as_str() });
    let mut effects = smallvec![];
    schedule_flush(state, env, &mut effects);
    effects
}

fn resume_from_redirect(
    state: &mut FlowState,
    env: &FlowEnvironment,
    hold_id: HoldId,
    success: bool,
) -> Effects<FlowAction> {
    if state.booking.is_some() {
        return smallvec![];
    }
    if success {
        state.pending_redirect = Some(hold_id);
        state.checkout = CheckoutStage::Polling { attempt: 0 };
        return smallvec![dispatch(FlowAction::PollBookingStatus { hold_id, attempt: 0 })];
    }

    state.pending_redirect = None;
    state.checkout = CheckoutStage::Idle;
    surface(state, env, ErrorCode::PaymentFailed);
    let mut effects = smallvec![];
    schedule_flush(state, env, &mut effects);
    effects
}

fn poll_booking_status(
    state: &FlowState,
    env: &FlowEnvironment,
    hold_id: HoldId,
    attempt: u32,
) -> Effects<FlowAction> {
    if state.booking.is_some() || !matches!(state.checkout, CheckoutStage::Polling { .. }) {
        return smallvec![];
    }
    if attempt == 0 {
        note(env, &FlowEvent::Request { name: "booking_status" });
    }
    let api = Arc::clone(&env.api);
    smallvec![Effect::future(async move {
        match api.booking_status(hold_id).await {
            Ok(response) if response.status == BookingState::Confirmed => {
                let booking = response.booking.unwrap_or_else(|| BookingRef {
                    booking_id: BookingId::new(format!("booking_{hold_id}")),
                    summary: None,
                    payment_collected: true,
                });
                Some(FlowAction::BookingStatusChecked {
                    hold_id,
                    attempt,
                    booking: Some(booking),
                })
            },
            Ok(response) if response.status == BookingState::Failed => {
                Some(FlowAction::CheckoutFailed { code: ErrorCode::PaymentFailed })
            },
            // Still pending, or a transient failure: both just consume an
            // attempt, since polling is idempotent.
            Ok(_) | Err(_) => Some(FlowAction::BookingStatusChecked {
                hold_id,
                attempt,
                booking: None,
            }),
        }
    })]
}

fn booking_status_checked(
    state: &mut FlowState,
    env: &FlowEnvironment,
    hold_id: HoldId,
    attempt: u32,
    booking: Option<BookingRef>,
) -> Effects<FlowAction> {
    // A response landing after the polling stage was torn down (hold expiry
    // clears checkout progress as one unit) is stale and must not restart
    // the loop.
    if state.booking.is_some() || !matches!(state.checkout, CheckoutStage::Polling { .. }) {
        return smallvec![];
    }
    if let Some(booking) = booking {
        return smallvec![dispatch(FlowAction::BookingConfirmed { booking })];
    }

    let next = attempt + 1;
    if next >= env.config.poll_attempts {
        // Distinct outcome: the booking may still confirm later outside the
        // client's visibility.
        state.checkout = CheckoutStage::Pending;
        let mut effects = smallvec![];
        schedule_flush(state, env, &mut effects);
        return effects;
    }

    state.checkout = CheckoutStage::Polling { attempt: next };
    smallvec![Effect::delay(
        env.config.poll_interval,
        FlowAction::PollBookingStatus { hold_id, attempt: next },
    )]
}

// ============================================================================
// Housekeeping
// ============================================================================

fn flush_snapshot(state: &mut FlowState, env: &FlowEnvironment) -> Effects<FlowAction> {
    state.flush_scheduled = false;
    if !state.snapshot_dirty {
        return smallvec![];
    }
    state.snapshot_dirty = false;

    let snapshot = state.snapshot(env.clock.now());
    let sessions = Arc::clone(&env.sessions);
    smallvec![Effect::future(async move {
        // Persistence is best-effort; a failed write must never break the
        // flow.
        if let Err(err) = persistence::save_snapshot(sessions.as_ref(), &snapshot) {
            tracing::warn!(error = %err, "session snapshot write failed");
        }
        None
    })]
}

fn idle_tick(state: &mut FlowState, env: &FlowEnvironment) -> Effects<FlowAction> {
    if !state.idle_tracking {
        return smallvec![];
    }
    let idle_for = (env.clock.now() - state.last_activity).num_seconds();
    let threshold = i64::try_from(env.config.idle_threshold.as_secs()).unwrap_or(i64::MAX);
    if !state.idle_notified && idle_for >= threshold {
        state.idle_notified = true;
        note(env, &FlowEvent::Idle { seconds: idle_for });
    }
    smallvec![Effect::delay(env.config.tick_interval, FlowAction::IdleTick)]
}

fn start_new_booking(state: &mut FlowState, env: &FlowEnvironment) -> Effects<FlowAction> {
    if state.booking.is_none() {
        return smallvec![];
    }
    state.booking = None;
    state.clear_hold_scope();
    state.error = None;
    let mut effects: Effects<FlowAction> = smallvec![];
    if state.selected_date.is_some() && state.selected_experience.is_some() {
        effects.push(dispatch(FlowAction::LoadSlots { retried: false }));
    }
    note(env, &FlowEvent::View { step: state.step().as_str() });
    schedule_flush(state, env, &mut effects);
    effects
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::FlowConfig;
    use crate::error::ApiError;
    use crate::persistence::MemorySessionStore;
    use crate::types::{BookingKind, Experience, Money, ResourceId, VenueId};
    use async_trait::async_trait;
    use bookflow_testing::{assertions, test_epoch, FixedClock, RecordingSink, ReducerTest};
    use chrono::{DateTime, Utc};

    /// Reducer unit tests never execute effects, so the API can refuse
    /// everything.
    struct UnusedApi;

    #[async_trait]
    impl crate::api::BookingApi for UnusedApi {
        async fn fetch_catalog(&self, _: VenueId) -> Result<Vec<Experience>, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn fetch_calendar(
            &self,
            _: VenueId,
            _: ExperienceId,
            _: &str,
        ) -> Result<Vec<NaiveDate>, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn fetch_availability(&self, _: &AvailabilityQuery) -> Result<Vec<Slot>, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn create_hold(
            &self,
            _: &wire::CreateHoldRequest,
        ) -> Result<wire::CreateHoldResponse, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn release_hold(&self, _: HoldId) -> Result<(), ApiError> {
            Ok(())
        }
        async fn check_promo(&self, _: &str) -> Result<wire::PromoCheckResponse, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn apply_promo(&self, _: HoldId, _: &str) -> Result<PricingSnapshot, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn check_gift_card(&self, _: &str) -> Result<Money, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn redeem_gift_card(
            &self,
            _: &wire::RedeemGiftCardRequest,
        ) -> Result<wire::RedeemGiftCardResponse, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn create_checkout(
            &self,
            _: &wire::CreateCheckoutRequest,
        ) -> Result<CheckoutSession, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn confirm_booking(
            &self,
            _: &wire::ConfirmBookingRequest,
        ) -> Result<wire::ConfirmBookingResponse, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
        async fn booking_status(&self, _: HoldId) -> Result<wire::BookingStatusResponse, ApiError> {
            Err(ApiError::Network("unused".to_owned()))
        }
    }

    fn test_env() -> FlowEnvironment {
        test_env_with_sink(Arc::new(RecordingSink::new()))
    }

    fn test_env_with_sink(sink: Arc<RecordingSink>) -> FlowEnvironment {
        FlowEnvironment::new(
            Arc::new(UnusedApi),
            Arc::new(MemorySessionStore::new()),
            Arc::new(FixedClock::new(test_epoch())),
            sink,
            FlowConfig::default(),
        )
    }

    fn pricing(total: u64) -> PricingSnapshot {
        PricingSnapshot {
            currency: "USD".to_owned(),
            subtotal: Money::from_minor(total.saturating_sub(300)),
            processing_fee: Money::from_minor(300),
            discount: None,
            total: Money::from_minor(total),
        }
    }

    fn active_hold(now: DateTime<Utc>) -> Hold {
        Hold {
            hold_id: HoldId::new(),
            resource_id: ResourceId::new(),
            start_at: now + chrono::Duration::hours(2),
            end_at: now + chrono::Duration::hours(3),
            party_size: 2,
            booking_kind: BookingKind::Public,
            status: HoldStatus::Active,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(10),
            pricing: pricing(6_300),
        }
    }

    fn slot(now: DateTime<Utc>) -> Slot {
        Slot {
            start_at: now + chrono::Duration::hours(2),
            end_at: now + chrono::Duration::hours(3),
            resource_id: ResourceId::new(),
            resource_label: Some("Room A".to_owned()),
            available: true,
            remaining_capacity: Some(6),
        }
    }

    fn valid_customer() -> Customer {
        Customer {
            name: "Ada Lovelace".to_owned(),
            phone: "5550102030".to_owned(),
            email: "ada@example.com".to_owned(),
        }
    }

    fn base_state() -> FlowState {
        FlowState::new(VenueId::new(), &FlowConfig::default(), test_epoch())
    }

    #[test]
    fn selecting_a_slot_invalidates_the_previous_hold_first() {
        let now = test_epoch();
        let mut state = base_state();
        state.hold = Some(active_hold(now));
        state.promo.applied_code = Some("SAVE10".to_owned());
        state.gift_card = Some(GiftCardApplication {
            code: "GC".to_owned(),
            remaining_balance: Money::from_minor(1_000),
        });

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::SelectSlot { slot: slot(now) })
            .then_state(|s| {
                // Previous hold gone, scope reset together, new one pending.
                assert!(s.hold.is_none());
                assert!(s.hold_in_flight);
                assert!(s.promo.applied_code.is_none());
                assert!(s.gift_card.is_none());
            })
            .then_effects(|effects| {
                // Release of the old hold plus creation of the new one.
                assertions::assert_has_future_effect(effects);
                assert!(effects.len() >= 2);
            })
            .run();
    }

    #[test]
    fn hold_mutations_are_ignored_while_one_is_in_flight() {
        let now = test_epoch();
        let mut state = base_state();
        state.hold_in_flight = true;

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::SelectSlot { slot: slot(now) })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn tick_for_a_replaced_hold_self_cancels() {
        let now = test_epoch();
        let mut state = base_state();
        state.hold = Some(active_hold(now));

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::CountdownTick { hold_id: HoldId::new() })
            .then_state(|s| assert!(s.hold.is_some()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn live_tick_updates_countdown_and_reschedules() {
        let now = test_epoch();
        let mut state = base_state();
        let hold = active_hold(now);
        let hold_id = hold.hold_id;
        state.hold = Some(hold);

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::CountdownTick { hold_id })
            .then_state(|s| assert_eq!(s.countdown_seconds, Some(600)))
            .then_effects(assertions::assert_has_delay_effect)
            .run();
    }

    #[test]
    fn expiry_clears_scope_and_returns_to_slot_selection() {
        let now = test_epoch();
        let mut state = base_state();
        let mut hold = active_hold(now);
        hold.expires_at = now; // remaining == 0
        let hold_id = hold.hold_id;
        state.hold = Some(hold);
        state.promo.applied_code = Some("SAVE10".to_owned());

        let sink = Arc::new(RecordingSink::new());
        let sink_probe = Arc::clone(&sink);

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env_with_sink(sink))
            .given_state(state)
            .when_action(FlowAction::CountdownTick { hold_id })
            .then_state(move |s| {
                assert!(s.hold.is_none());
                assert_eq!(s.promo, PromoApplication::default());
                assert_eq!(s.error, Some(ErrorCode::HoldExpired));
                assert_eq!(s.step(), FlowStep::SlotSelection);
                assert!(sink_probe.saw("hold-expired"));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn expired_hold_stays_expired_on_later_ticks() {
        let now = test_epoch();
        let mut state = base_state();
        let mut hold = active_hold(now);
        hold.expires_at = now;
        let hold_id = hold.hold_id;
        state.hold = Some(hold);

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::CountdownTick { hold_id })
            .when_action(FlowAction::CountdownTick { hold_id })
            .then_state(|s| assert!(s.hold.is_none()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn stale_slot_responses_never_overwrite_fresher_state() {
        let now = test_epoch();
        let mut state = base_state();
        state.selected_experience = Some(ExperienceId::new());
        state.selected_date = Some(now.date_naive());
        let superseded = state.next_request_tag();
        let _current = state.next_request_tag();
        let query = current_query(&state).unwrap();

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::SlotsLoaded {
                tag: superseded,
                query,
                slots: vec![slot(now)],
            })
            .then_state(|s| {
                assert!(s.slots.is_empty());
                assert!(s.current_slots_request.is_some());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn transient_slots_failure_schedules_exactly_one_retry() {
        let now = test_epoch();
        let mut state = base_state();
        state.selected_experience = Some(ExperienceId::new());
        state.selected_date = Some(now.date_naive());
        let tag = state.next_request_tag();

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state.clone())
            .when_action(FlowAction::SlotsFailed {
                tag,
                code: ErrorCode::RequestTimeout,
                retried: false,
            })
            .then_state(|s| assert!(s.slots_error.is_none()))
            .then_effects(assertions::assert_has_delay_effect)
            .run();

        // The retry itself failing surfaces the error instead of looping.
        let tag = state.next_request_tag();
        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::SlotsFailed {
                tag,
                code: ErrorCode::RequestTimeout,
                retried: true,
            })
            .then_state(|s| {
                assert!(!s.slots_loading);
                assert_eq!(s.slots_error, Some(ErrorCode::RequestTimeout));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn conflict_failures_are_not_retried() {
        let now = test_epoch();
        let mut state = base_state();
        state.selected_experience = Some(ExperienceId::new());
        state.selected_date = Some(now.date_naive());
        let tag = state.next_request_tag();

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::SlotsFailed {
                tag,
                code: ErrorCode::SlotUnavailable,
                retried: false,
            })
            .then_state(|s| assert_eq!(s.slots_error, Some(ErrorCode::SlotUnavailable)))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn conflicting_hold_creation_clears_selection_and_reloads_slots() {
        let now = test_epoch();
        let mut state = base_state();
        state.selected_experience = Some(ExperienceId::new());
        state.selected_date = Some(now.date_naive());
        state.hold_in_flight = true;
        state.gift_card = Some(GiftCardApplication {
            code: "GC".to_owned(),
            remaining_balance: Money::from_minor(1_000),
        });

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::HoldFailed {
                code: ErrorCode::SlotUnavailable,
            })
            .then_state(|s| {
                assert!(!s.hold_in_flight);
                assert!(s.gift_card.is_none());
                assert_eq!(s.error, Some(ErrorCode::SlotUnavailable));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn changing_party_size_invalidates_the_hold_before_the_change() {
        let now = test_epoch();
        let mut state = base_state();
        state.hold = Some(active_hold(now));

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::SetPartySize { party_size: 4 })
            .then_state(|s| {
                assert!(s.hold.is_none());
                assert_eq!(s.party_size, 4);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn reapplying_the_applied_promo_short_circuits() {
        let now = test_epoch();
        let mut state = base_state();
        state.hold = Some(active_hold(now));
        state.promo = PromoApplication {
            code: "SAVE10".to_owned(),
            status: PromoStatus::Valid,
            message: None,
            applied_code: Some("SAVE10".to_owned()),
        };

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::ApplyPromo)
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn promo_applied_replaces_the_snapshot_wholesale() {
        let now = test_epoch();
        let mut state = base_state();
        let hold = active_hold(now);
        let hold_id = hold.hold_id;
        state.hold = Some(hold);
        state.promo = PromoApplication {
            code: "SAVE10".to_owned(),
            status: PromoStatus::Valid,
            message: None,
            applied_code: None,
        };

        let discounted = PricingSnapshot {
            currency: "USD".to_owned(),
            subtotal: Money::from_minor(6_000),
            processing_fee: Money::from_minor(300),
            discount: Some(Money::from_minor(630)),
            total: Money::from_minor(5_670),
        };
        let expected = discounted.clone();

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::PromoApplied {
                hold_id,
                code: "SAVE10".to_owned(),
                pricing: discounted,
            })
            .then_state(move |s| {
                assert_eq!(s.hold.as_ref().unwrap().pricing, expected);
                assert_eq!(s.promo.applied_code.as_deref(), Some("SAVE10"));
            })
            .run();
    }

    #[test]
    fn promo_applied_for_a_replaced_hold_is_discarded() {
        let now = test_epoch();
        let mut state = base_state();
        let hold = active_hold(now);
        let original_pricing = hold.pricing.clone();
        state.hold = Some(hold);

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::PromoApplied {
                hold_id: HoldId::new(),
                code: "SAVE10".to_owned(),
                pricing: pricing(1),
            })
            .then_state(move |s| {
                assert_eq!(s.hold.as_ref().unwrap().pricing, original_pricing);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn checkout_rejects_invalid_customer_details() {
        let now = test_epoch();
        let mut state = base_state();
        state.hold = Some(active_hold(now));
        state.customer = Customer {
            name: "Ada".to_owned(),
            phone: "5550102030".to_owned(),
            email: "nope".to_owned(),
        };

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::BeginCheckout)
            .then_state(|s| {
                assert_eq!(s.error, Some(ErrorCode::InvalidEmail));
                assert_eq!(s.checkout, CheckoutStage::Idle);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn covering_gift_card_skips_payment() {
        let now = test_epoch();
        let mut state = base_state();
        state.hold = Some(active_hold(now));
        state.customer = valid_customer();
        state.gift_card = Some(GiftCardApplication {
            code: "GC-1".to_owned(),
            remaining_balance: Money::from_minor(10_000),
        });

        let sink = Arc::new(RecordingSink::new());
        let sink_probe = Arc::clone(&sink);

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env_with_sink(sink))
            .given_state(state)
            .when_action(FlowAction::BeginCheckout)
            .then_state(move |s| {
                assert_eq!(s.checkout, CheckoutStage::CreatingSession);
                assert!(sink_probe.saw("checkout-started"));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn payment_unavailable_confirms_without_surfacing_an_error() {
        let now = test_epoch();
        let mut state = base_state();
        let hold = active_hold(now);
        let hold_id = hold.hold_id;
        state.hold = Some(hold);
        state.customer = valid_customer();
        state.checkout = CheckoutStage::CreatingSession;

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::PaymentUnavailable { hold_id })
            .then_state(|s| assert!(s.error.is_none()))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn redirect_session_persists_before_navigation() {
        let now = test_epoch();
        let mut state = base_state();
        let hold = active_hold(now);
        let hold_id = hold.hold_id;
        state.hold = Some(hold);
        state.checkout = CheckoutStage::CreatingSession;

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::CheckoutSessionCreated {
                hold_id,
                session: CheckoutSession::Redirect {
                    url: "https://pay.example/r/1".to_owned(),
                },
            })
            .then_state(move |s| {
                assert_eq!(s.pending_redirect, Some(hold_id));
                assert!(matches!(s.checkout, CheckoutStage::RedirectIssued { .. }));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn booking_confirmation_consumes_the_hold() {
        let now = test_epoch();
        let mut state = base_state();
        state.hold = Some(active_hold(now));
        state.customer = valid_customer();

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::BookingConfirmed {
                booking: BookingRef {
                    booking_id: BookingId::new("booking_1"),
                    summary: None,
                    payment_collected: true,
                },
            })
            .then_state(|s| {
                assert_eq!(s.hold.as_ref().unwrap().status, HoldStatus::Consumed);
                assert_eq!(s.step(), FlowStep::Confirmed);
                assert!(s.countdown_seconds.is_none());
            })
            .run();
    }

    #[test]
    fn resume_from_redirect_starts_polling() {
        let mut state = base_state();
        state.customer = valid_customer();
        let hold_id = HoldId::new();

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::ResumeFromRedirect { hold_id, success: true })
            .then_state(move |s| {
                assert_eq!(s.checkout, CheckoutStage::Polling { attempt: 0 });
                assert_eq!(s.pending_redirect, Some(hold_id));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn poll_exhaustion_yields_a_distinct_pending_outcome() {
        let mut state = base_state();
        state.checkout = CheckoutStage::Polling { attempt: 29 };
        let hold_id = HoldId::new();

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::BookingStatusChecked {
                hold_id,
                attempt: 29,
                booking: None,
            })
            .then_state(|s| {
                assert_eq!(s.checkout, CheckoutStage::Pending);
                assert_eq!(s.step(), FlowStep::AwaitingConfirmation);
            })
            .run();
    }

    #[test]
    fn unanswered_poll_schedules_the_next_attempt() {
        let mut state = base_state();
        state.checkout = CheckoutStage::Polling { attempt: 0 };
        let hold_id = HoldId::new();

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::BookingStatusChecked {
                hold_id,
                attempt: 0,
                booking: None,
            })
            .then_state(|s| assert_eq!(s.checkout, CheckoutStage::Polling { attempt: 1 }))
            .then_effects(assertions::assert_has_delay_effect)
            .run();
    }

    #[test]
    fn poll_response_after_checkout_reset_is_discarded() {
        // Hold expiry tears down checkout progress as one unit; a poll
        // response still in flight must not revive the polling loop.
        let mut state = base_state();
        state.checkout = CheckoutStage::Idle;

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::BookingStatusChecked {
                hold_id: HoldId::new(),
                attempt: 0,
                booking: None,
            })
            .then_state(|s| {
                assert_eq!(s.checkout, CheckoutStage::Idle);
                assert_eq!(s.step(), FlowStep::SlotSelection);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn snapshot_flushes_are_coalesced() {
        let now = test_epoch();
        let mut state = base_state();
        state.hold = Some(active_hold(now));

        // Two dirtying actions, but only the first schedules a flush.
        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env())
            .given_state(state)
            .when_action(FlowAction::UpdateCustomer { customer: valid_customer() })
            .when_action(FlowAction::UpdateCustomer { customer: valid_customer() })
            .then_state(|s| {
                assert!(s.snapshot_dirty);
                assert!(s.flush_scheduled);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn idle_event_fires_once_per_inactivity_span() {
        let mut state = base_state();
        state.idle_tracking = true;
        state.last_activity = test_epoch() - chrono::Duration::seconds(200);

        let sink = Arc::new(RecordingSink::new());
        let sink_probe = Arc::clone(&sink);

        ReducerTest::new(BookingFlowReducer)
            .with_env(test_env_with_sink(sink))
            .given_state(state)
            .when_action(FlowAction::IdleTick)
            .when_action(FlowAction::IdleTick)
            .then_state(move |s| {
                assert!(s.idle_notified);
                assert_eq!(
                    sink_probe.names().iter().filter(|n| *n == "idle").count(),
                    1
                );
            })
            .then_effects(assertions::assert_has_delay_effect)
            .run();
    }
}
