//! Closed error vocabulary and taxonomy.
//!
//! Every error the server can return is a known code; the client keeps a
//! total mapping from each code to a user-facing sentence, with a generic
//! fallback for anything unrecognized. Raw codes or error objects are never
//! rendered directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How an error should be handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network, timeout, 5xx, rate limit. Retried once with backoff, then
    /// surfaced with a retry affordance.
    Transient,
    /// Slot taken, capacity exceeded, hold expired. Never auto-retried;
    /// local hold/selection state is discarded and the user returns to the
    /// slot picker.
    Conflict,
    /// Bad input. Caught client-side where possible; a server validation
    /// error maps to the same message the client would have produced.
    Validation,
    /// Payment not set up. Triggers the automatic no-payment fallback and is
    /// never shown as an error.
    Configuration,
    /// Anything else. Mapped to a generic "try again" message.
    Unknown,
}

/// Every error code the flow knows how to handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The slot was taken between display and reservation.
    SlotUnavailable,
    /// Party size exceeds the slot's remaining capacity.
    SlotCapacityExceeded,
    /// Party size outside the experience's accepted range.
    InvalidPartySize,
    /// The hold expired before the operation completed.
    HoldExpired,
    /// Server is rate-limiting the client.
    RateLimited,
    /// The request hit its timeout.
    RequestTimeout,
    /// Connection-level failure.
    NetworkError,
    /// 5xx from the server.
    ServerError,
    /// Payment provider unavailable or unconfigured.
    PaymentNotConfigured,
    /// The payment attempt itself failed.
    PaymentFailed,
    /// Promo code rejected.
    InvalidPromoCode,
    /// Promo code exists but cannot apply to this booking.
    PromoNotSupported,
    /// Gift-card code not recognized.
    GiftCardNotFound,
    /// Missing or empty customer name.
    InvalidName,
    /// Malformed email address.
    InvalidEmail,
    /// Phone number too short or malformed.
    InvalidPhone,
    /// Any code the client does not recognize.
    Unknown,
}

impl ErrorCode {
    /// Parse a wire code, falling back to [`ErrorCode::Unknown`] for
    /// anything outside the vocabulary. `invalid_players` is the legacy wire
    /// spelling of [`ErrorCode::InvalidPartySize`].
    #[must_use]
    pub fn from_wire(code: &str) -> Self {
        match code {
            "slot_unavailable" => Self::SlotUnavailable,
            "slot_capacity_exceeded" => Self::SlotCapacityExceeded,
            "invalid_party_size" | "invalid_players" => Self::InvalidPartySize,
            "hold_expired" => Self::HoldExpired,
            "rate_limited" => Self::RateLimited,
            "request_timeout" => Self::RequestTimeout,
            "network_error" => Self::NetworkError,
            "server_error" => Self::ServerError,
            "payment_not_configured" => Self::PaymentNotConfigured,
            "payment_failed" => Self::PaymentFailed,
            "invalid_promo_code" => Self::InvalidPromoCode,
            "promo_not_supported" => Self::PromoNotSupported,
            "gift_card_not_found" => Self::GiftCardNotFound,
            "invalid_name" => Self::InvalidName,
            "invalid_email" => Self::InvalidEmail,
            "invalid_phone" => Self::InvalidPhone,
            _ => Self::Unknown,
        }
    }

    /// The wire spelling of this code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SlotUnavailable => "slot_unavailable",
            Self::SlotCapacityExceeded => "slot_capacity_exceeded",
            Self::InvalidPartySize => "invalid_party_size",
            Self::HoldExpired => "hold_expired",
            Self::RateLimited => "rate_limited",
            Self::RequestTimeout => "request_timeout",
            Self::NetworkError => "network_error",
            Self::ServerError => "server_error",
            Self::PaymentNotConfigured => "payment_not_configured",
            Self::PaymentFailed => "payment_failed",
            Self::InvalidPromoCode => "invalid_promo_code",
            Self::PromoNotSupported => "promo_not_supported",
            Self::GiftCardNotFound => "gift_card_not_found",
            Self::InvalidName => "invalid_name",
            Self::InvalidEmail => "invalid_email",
            Self::InvalidPhone => "invalid_phone",
            Self::Unknown => "unknown",
        }
    }

    /// How the flow should react to this code.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::RateLimited | Self::RequestTimeout | Self::NetworkError | Self::ServerError => {
                ErrorClass::Transient
            },
            Self::SlotUnavailable | Self::SlotCapacityExceeded | Self::HoldExpired => {
                ErrorClass::Conflict
            },
            Self::InvalidPartySize
            | Self::InvalidPromoCode
            | Self::PromoNotSupported
            | Self::GiftCardNotFound
            | Self::InvalidName
            | Self::InvalidEmail
            | Self::InvalidPhone => ErrorClass::Validation,
            Self::PaymentNotConfigured => ErrorClass::Configuration,
            Self::PaymentFailed | Self::Unknown => ErrorClass::Unknown,
        }
    }

    /// The user-facing sentence for this code. Total over the vocabulary;
    /// [`ErrorCode::Unknown`] carries the generic fallback.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::SlotUnavailable => "That time was just booked. Please pick another slot.",
            Self::SlotCapacityExceeded => {
                "That time can't fit your group. Please pick another slot or adjust your party size."
            },
            Self::InvalidPartySize => "Please choose a valid number of people for this experience.",
            Self::HoldExpired => "Your reservation timer ran out. Please pick a time again.",
            Self::RateLimited => "We're receiving a lot of requests. Please try again in a moment.",
            Self::RequestTimeout => "That took too long. Please check your connection and try again.",
            Self::NetworkError => "We couldn't reach the booking service. Please try again.",
            Self::ServerError => "Booking is temporarily unavailable. Please try again shortly.",
            Self::PaymentNotConfigured => {
                "No payment is needed right now; we'll confirm your booking directly."
            },
            Self::PaymentFailed => "Your payment didn't go through. Please try again.",
            Self::InvalidPromoCode => "That promo code isn't valid.",
            Self::PromoNotSupported => "That promo code can't be used for this booking.",
            Self::GiftCardNotFound => "We couldn't find a gift card with that code.",
            Self::InvalidName => "Please enter your name.",
            Self::InvalidEmail => "Please enter a valid email address.",
            Self::InvalidPhone => "Please enter a valid phone number.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failures from the HTTP booking API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request exceeded its timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure before any response.
    #[error("network failure: {0}")]
    Network(String),

    /// The server answered with an error status and a coded body.
    #[error("server returned {code} (http {status})")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Parsed error code from the body.
        code: ErrorCode,
    },

    /// A 2xx response whose body did not decode.
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map this failure into the closed error vocabulary.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout => ErrorCode::RequestTimeout,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Server { code, .. } => *code,
            Self::Decode(_) => ErrorCode::Unknown,
        }
    }

    /// Whether retrying could help.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.code().class(), ErrorClass::Transient)
    }
}
