//! Domain types for the booking-hold flow.
//!
//! This module contains the value objects and entities the flow engine moves
//! through its state machine: slots, holds, pricing snapshots, promo and
//! gift-card applications, customer details, and confirmed booking
//! references. Prices are integer minor units end to end; the engine never
//! does price arithmetic beyond the gift-card `min(balance, total)` bound.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing `Uuid`.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a server-tracked hold.
    HoldId
}

uuid_id! {
    /// Unique identifier for a bookable resource (room, table, lane).
    ResourceId
}

uuid_id! {
    /// Unique identifier for a venue.
    VenueId
}

uuid_id! {
    /// Unique identifier for a bookable experience within a venue.
    ExperienceId
}

uuid_id! {
    /// Unique identifier for one client session, used to namespace the
    /// persisted snapshot.
    SessionId
}

/// Server-assigned booking reference, e.g. `booking_7f3a…`. Opaque to the
/// client; only ever displayed or polled against.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    /// Wraps a server-provided reference string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// A monetary amount in integer minor units (cents).
///
/// All amounts come from the server; the client combines them only with
/// checked operations and never derives a total itself.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from minor units.
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts with overflow checking.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts with underflow checking.
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// The smaller of two amounts.
    #[must_use]
    pub const fn min_with(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Slots & availability
// ============================================================================

/// Whether a reservation claims a resource exclusively or shares its
/// capacity with other parties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    /// Shared-capacity booking.
    #[default]
    Public,
    /// Exclusive-use booking.
    Private,
}

impl BookingKind {
    /// Wire spelling, used in query strings.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// One bookable (resource, start, end) window.
///
/// Produced by the availability service and treated as immutable: the client
/// re-fetches slots, never mutates them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Window start.
    pub start_at: DateTime<Utc>,
    /// Window end.
    pub end_at: DateTime<Utc>,
    /// The resource this window belongs to.
    pub resource_id: ResourceId,
    /// Optional display label for the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_label: Option<String>,
    /// Whether the window can currently be booked.
    pub available: bool,
    /// Remaining shared capacity, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_capacity: Option<u32>,
}

/// One bookable experience from the venue catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Experience identifier.
    pub id: ExperienceId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Party sizes the experience accepts, inclusive.
    pub min_party_size: u32,
    /// Upper bound on party size, inclusive.
    pub max_party_size: u32,
}

// ============================================================================
// Pricing
// ============================================================================

/// The authoritative, server-computed price breakdown attached to a hold.
///
/// Recomputed wholesale by the server whenever promo or gift-card state
/// changes; the client replaces the entire snapshot and never patches
/// individual fields with its own arithmetic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    /// ISO 4217 currency code.
    pub currency: String,
    /// Base price before fees and discounts.
    pub subtotal: Money,
    /// Processing fee.
    pub processing_fee: Money,
    /// Promo discount, when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Money>,
    /// Amount due.
    pub total: Money,
}

// ============================================================================
// Holds
// ============================================================================

/// Lifecycle of a hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    /// Reservation is live and counting down.
    Active,
    /// `expires_at` elapsed unconsumed.
    Expired,
    /// Converted into a confirmed booking.
    Consumed,
}

/// A time-bound, server-tracked reservation of one slot.
///
/// At most one active hold exists per session. The server is authoritative
/// for expiry; the client countdown is advisory and reconciles against
/// server responses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hold {
    /// Server-assigned hold identifier.
    pub hold_id: HoldId,
    /// The reserved resource.
    pub resource_id: ResourceId,
    /// Reserved window start.
    pub start_at: DateTime<Utc>,
    /// Reserved window end.
    pub end_at: DateTime<Utc>,
    /// Party size the hold was created for.
    pub party_size: u32,
    /// Public or private booking.
    pub booking_kind: BookingKind,
    /// Lifecycle status.
    pub status: HoldStatus,
    /// When the hold was created.
    pub created_at: DateTime<Utc>,
    /// When the server will release the hold if unconsumed.
    pub expires_at: DateTime<Utc>,
    /// Authoritative pricing from the reservation response.
    pub pricing: PricingSnapshot,
}

impl Hold {
    /// Whether the hold has passed its expiry instant.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == HoldStatus::Expired || now >= self.expires_at
    }

    /// Whole seconds remaining before expiry, clamped at zero.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

// ============================================================================
// Promotions & gift cards
// ============================================================================

/// Validation lifecycle of a promo code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoStatus {
    /// No code entered or validation not started.
    #[default]
    Idle,
    /// Validation request in flight.
    Checking,
    /// Code is valid (may or may not be applied to a hold yet).
    Valid,
    /// Code was rejected.
    Invalid,
    /// Code is real but not usable for this booking.
    Unsupported,
}

/// Promo-code state, scoped to one hold and cleared when the hold is
/// replaced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PromoApplication {
    /// The entered code.
    pub code: String,
    /// Validation status.
    pub status: PromoStatus,
    /// Server-provided message for invalid/unsupported codes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The code currently applied to the hold's pricing, if any. Used to
    /// short-circuit re-applying the same code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_code: Option<String>,
}

/// A checked gift card. Redemption happens only at checkout, for exactly
/// `min(balance, total)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GiftCardApplication {
    /// The gift-card code.
    pub code: String,
    /// Balance as of the last check.
    pub remaining_balance: Money,
}

impl GiftCardApplication {
    /// The amount this card would redeem against the given total:
    /// `min(balance, total)`, never more than either bound.
    #[must_use]
    pub const fn redeemable_against(&self, total: Money) -> Money {
        self.remaining_balance.min_with(total)
    }

    /// Whether the card covers the whole total, letting checkout skip
    /// payment entirely.
    #[must_use]
    pub fn covers(&self, total: Money) -> bool {
        self.remaining_balance >= total
    }
}

// ============================================================================
// Customer
// ============================================================================

/// Contact details collected before hold consumption. Fields fill in
/// incrementally; [`Customer::validate`] runs at submission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Full name.
    #[serde(default)]
    pub name: String,
    /// Phone number.
    #[serde(default)]
    pub phone: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
}

impl Customer {
    /// Validates the details for submission.
    ///
    /// # Errors
    ///
    /// Returns the first failing field's error code: empty name, an email
    /// without a local part and domain, or a phone number with fewer than
    /// seven digits.
    pub fn validate(&self) -> Result<(), crate::error::ErrorCode> {
        use crate::error::ErrorCode;

        if self.name.trim().is_empty() {
            return Err(ErrorCode::InvalidName);
        }

        let mut parts = self.email.splitn(2, '@');
        let local = parts.next().unwrap_or_default();
        let domain = parts.next().unwrap_or_default();
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(ErrorCode::InvalidEmail);
        }

        let digits = self.phone.chars().filter(char::is_ascii_digit).count();
        if digits < 7 {
            return Err(ErrorCode::InvalidPhone);
        }

        Ok(())
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// A server-confirmed booking. The client receives only the reference and an
/// optional display summary; created exactly once per consumed hold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingRef {
    /// Server-assigned reference.
    pub booking_id: BookingId,
    /// Optional display summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Whether payment was collected for this booking. `false` on the
    /// gift-card and no-payment paths so a host can trigger follow-up.
    #[serde(default)]
    pub payment_collected: bool,
}
