//! The booking API boundary.
//!
//! The flow engine talks to the server exclusively through the [`BookingApi`]
//! trait, which keeps effects testable with scripted implementations. The
//! [`HttpBookingApi`] is the production implementation on `reqwest`.

use crate::availability::AvailabilityQuery;
use crate::error::ApiError;
use crate::types::{
    BookingRef, Experience, ExperienceId, HoldId, Money, PricingSnapshot, Slot, VenueId,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

mod http;

pub use http::HttpBookingApi;

/// What a successful checkout-session creation yields: either an in-page
/// payment secret or a full-navigation redirect URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckoutSession {
    /// The hosted payment element renders in place with this secret.
    InPage {
        /// Provider client secret.
        client_secret: String,
    },
    /// The browser navigates away to this URL; the process is torn down and
    /// resumes later via URL markers.
    Redirect {
        /// Provider-hosted payment page.
        url: String,
    },
}

/// Polled confirmation status of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingState {
    /// Payment still settling; poll again.
    Pending,
    /// Booking confirmed.
    Confirmed,
    /// Payment failed server-side.
    Failed,
}

/// Wire DTOs for the booking API.
pub mod wire {
    use super::{BookingRef, BookingState, Deserialize, HoldId, Money, PricingSnapshot, Serialize};
    use crate::types::{BookingId, BookingKind, Customer, ResourceId};
    use chrono::{DateTime, Utc};

    /// Body of `POST holds`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CreateHoldRequest {
        /// Resource to reserve.
        pub resource_id: ResourceId,
        /// Window start.
        pub start_at: DateTime<Utc>,
        /// Window end.
        pub end_at: DateTime<Utc>,
        /// Party size.
        pub party_size: u32,
        /// Public or private.
        pub booking_kind: BookingKind,
        /// Whatever contact details are known so far.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub customer: Option<Customer>,
    }

    /// Response of `POST holds`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CreateHoldResponse {
        /// Server-assigned hold id.
        pub hold_id: HoldId,
        /// Server-side expiry instant.
        pub expires_at: DateTime<Utc>,
        /// Authoritative pricing.
        pub pricing: PricingSnapshot,
    }

    /// Response of `POST promos/check`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PromoCheckResponse {
        /// Whether the code can be applied at all.
        pub valid: bool,
        /// Whether the code applies to this kind of booking. Defaults to
        /// `true` for valid codes.
        #[serde(default = "default_true")]
        pub supported: bool,
        /// Display message for rejected codes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub message: Option<String>,
    }

    const fn default_true() -> bool {
        true
    }

    /// Body of `POST gift-cards/redeem`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct RedeemGiftCardRequest {
        /// Gift-card code.
        pub code: String,
        /// The hold being paid for.
        pub hold_id: HoldId,
        /// Exact amount to redeem, `min(balance, total)`.
        pub amount: Money,
    }

    /// Response of `POST gift-cards/redeem`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct RedeemGiftCardResponse {
        /// Amount actually redeemed.
        pub redeemed: Money,
        /// Balance left on the card.
        pub remaining_balance: Money,
    }

    /// Body of `POST checkout/create`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CreateCheckoutRequest {
        /// The hold being paid for.
        pub hold_id: HoldId,
        /// Validated contact details.
        pub customer: Customer,
        /// Partially covering gift card, netted server-side.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub gift_card_code: Option<String>,
    }

    /// Body of `POST bookings/confirm` (non-payment path).
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ConfirmBookingRequest {
        /// The hold to consume.
        pub hold_id: HoldId,
        /// Validated contact details.
        pub customer: Customer,
    }

    /// Response of `POST bookings/confirm`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ConfirmBookingResponse {
        /// Server-assigned reference.
        pub booking_id: BookingId,
        /// Optional display summary.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub summary: Option<String>,
    }

    /// Response of `GET bookings/{holdId}`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct BookingStatusResponse {
        /// Confirmation state.
        pub status: BookingState,
        /// The booking, present once confirmed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub booking: Option<BookingRef>,
    }

    /// Error body shape: `{"error": "<code>", "message": ...}`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ErrorBody {
        /// Wire error code.
        pub error: String,
        /// Optional server message, never rendered directly.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub message: Option<String>,
    }
}

/// Everything the flow needs from the server.
///
/// One method per endpoint; implementations own transport concerns
/// (timeouts, the extra attempt on timeout) while the flow owns the
/// user-visible retry.
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// `GET catalog` — bookable experiences for a venue.
    async fn fetch_catalog(&self, venue: VenueId) -> Result<Vec<Experience>, ApiError>;

    /// `GET calendar?month` — dates with any availability.
    async fn fetch_calendar(
        &self,
        venue: VenueId,
        experience: ExperienceId,
        month: &str,
    ) -> Result<Vec<NaiveDate>, ApiError>;

    /// `GET availability?date,type,partySize` — ordered slot list.
    async fn fetch_availability(&self, query: &AvailabilityQuery) -> Result<Vec<Slot>, ApiError>;

    /// `POST holds` — reserve a slot.
    async fn create_hold(
        &self,
        request: &wire::CreateHoldRequest,
    ) -> Result<wire::CreateHoldResponse, ApiError>;

    /// `DELETE holds/{id}` — release a hold early so the server can free
    /// capacity. Best-effort; callers never block on it.
    async fn release_hold(&self, hold_id: HoldId) -> Result<(), ApiError>;

    /// `POST promos/check` — standalone code validation, independent of any
    /// hold.
    async fn check_promo(&self, code: &str) -> Result<wire::PromoCheckResponse, ApiError>;

    /// `POST holds/{id}/apply-promo` — apply a validated code; the response
    /// replaces the pricing snapshot wholesale.
    async fn apply_promo(&self, hold_id: HoldId, code: &str)
        -> Result<PricingSnapshot, ApiError>;

    /// `POST gift-cards/check` — read-only balance lookup.
    async fn check_gift_card(&self, code: &str) -> Result<Money, ApiError>;

    /// `POST gift-cards/redeem` — redeem at checkout.
    async fn redeem_gift_card(
        &self,
        request: &wire::RedeemGiftCardRequest,
    ) -> Result<wire::RedeemGiftCardResponse, ApiError>;

    /// `POST checkout/create` — create a payment session. A provider that is
    /// not configured surfaces as [`ApiError::Server`] with
    /// [`ErrorCode::PaymentNotConfigured`](crate::error::ErrorCode::PaymentNotConfigured).
    async fn create_checkout(
        &self,
        request: &wire::CreateCheckoutRequest,
    ) -> Result<CheckoutSession, ApiError>;

    /// `POST bookings/confirm` — confirm without provider payment (gift-card
    /// and no-payment paths).
    async fn confirm_booking(
        &self,
        request: &wire::ConfirmBookingRequest,
    ) -> Result<wire::ConfirmBookingResponse, ApiError>;

    /// `GET bookings/{holdId}` — confirmation status, the redirect-return
    /// polling target. Idempotent and safely restartable.
    async fn booking_status(&self, hold_id: HoldId)
        -> Result<wire::BookingStatusResponse, ApiError>;
}
