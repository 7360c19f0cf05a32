//! Property tests for the money-handling and restore invariants.

#![allow(clippy::unwrap_used)]

use bookflow_engine::error::ErrorCode;
use bookflow_engine::persistence::{SessionSnapshot, SNAPSHOT_VERSION};
use bookflow_engine::types::{
    BookingKind, Customer, GiftCardApplication, Hold, HoldId, HoldStatus, Money, PricingSnapshot,
    PromoApplication, ResourceId, SessionId, VenueId,
};
use bookflow_testing::test_epoch;
use proptest::prelude::*;

fn pricing(total: u64) -> PricingSnapshot {
    PricingSnapshot {
        currency: "USD".to_owned(),
        subtotal: Money::from_minor(total),
        processing_fee: Money::from_minor(0),
        discount: None,
        total: Money::from_minor(total),
    }
}

fn hold_expiring_at_offset(offset_secs: i64) -> Hold {
    let now = test_epoch();
    Hold {
        hold_id: HoldId::new(),
        resource_id: ResourceId::new(),
        start_at: now + chrono::Duration::hours(2),
        end_at: now + chrono::Duration::hours(3),
        party_size: 2,
        booking_kind: BookingKind::Public,
        status: HoldStatus::Active,
        created_at: now,
        expires_at: now + chrono::Duration::seconds(offset_secs),
        pricing: pricing(6_300),
    }
}

fn snapshot_with_hold(hold: Hold) -> SessionSnapshot {
    SessionSnapshot {
        version: SNAPSHOT_VERSION,
        venue_id: VenueId::new(),
        session_id: SessionId::new(),
        selected_experience: None,
        selected_date: None,
        booking_kind: BookingKind::Public,
        party_size: 2,
        hold: Some(hold),
        promo: PromoApplication {
            code: "SAVE10".to_owned(),
            status: bookflow_engine::types::PromoStatus::Valid,
            message: None,
            applied_code: Some("SAVE10".to_owned()),
        },
        gift_card: Some(GiftCardApplication {
            code: "GC".to_owned(),
            remaining_balance: Money::from_minor(1_000),
        }),
        customer: Customer::default(),
        booking: None,
        pending_redirect: None,
        saved_at: test_epoch(),
    }
}

proptest! {
    /// The redeemed amount never exceeds the balance or the total, and the
    /// card covers the total exactly when the balance is at least the total.
    #[test]
    fn gift_card_redemption_is_bounded_by_both_sides(
        balance in 0u64..=1_000_000,
        total in 0u64..=1_000_000,
    ) {
        let card = GiftCardApplication {
            code: "GC".to_owned(),
            remaining_balance: Money::from_minor(balance),
        };
        let total = Money::from_minor(total);
        let redeemed = card.redeemable_against(total);

        prop_assert!(redeemed <= card.remaining_balance);
        prop_assert!(redeemed <= total);
        prop_assert_eq!(card.covers(total), card.remaining_balance >= total);
        // Redeeming never underflows either side.
        prop_assert!(card.remaining_balance.checked_sub(redeemed).is_some());
        prop_assert!(total.checked_sub(redeemed).is_some());
        // A covering card redeems exactly the total.
        if card.covers(total) {
            prop_assert_eq!(redeemed, total);
        }
    }

    /// Restoring a snapshot keeps the hold exactly when it is still live,
    /// and an expired hold takes its scoped promo and gift-card state along.
    #[test]
    fn sanitize_never_revives_an_expired_hold(offset_secs in -3_600i64..=3_600) {
        let snapshot = snapshot_with_hold(hold_expiring_at_offset(offset_secs));
        let sanitized = snapshot.sanitized(test_epoch());

        if offset_secs > 0 {
            prop_assert!(sanitized.hold.is_some());
            prop_assert_eq!(sanitized.promo.applied_code.as_deref(), Some("SAVE10"));
        } else {
            prop_assert!(sanitized.hold.is_none());
            prop_assert!(sanitized.promo.applied_code.is_none());
            prop_assert!(sanitized.gift_card.is_none());
            prop_assert!(sanitized.pending_redirect.is_none());
        }
    }

    /// Remaining seconds never go negative and shrink monotonically.
    #[test]
    fn countdown_is_clamped_and_monotonic(
        expiry in 0i64..=1_200,
        elapsed_a in 0i64..=2_400,
        elapsed_b in 0i64..=2_400,
    ) {
        let hold = hold_expiring_at_offset(expiry);
        let (early, late) = if elapsed_a <= elapsed_b {
            (elapsed_a, elapsed_b)
        } else {
            (elapsed_b, elapsed_a)
        };
        let at_early = hold.remaining_seconds(test_epoch() + chrono::Duration::seconds(early));
        let at_late = hold.remaining_seconds(test_epoch() + chrono::Duration::seconds(late));

        prop_assert!(at_early >= 0);
        prop_assert!(at_late >= 0);
        prop_assert!(at_early >= at_late);
    }

    /// Every wire spelling the client emits parses back to the same code,
    /// and arbitrary strings always land somewhere in the vocabulary.
    #[test]
    fn error_vocabulary_is_total(raw in ".{0,32}") {
        let parsed = ErrorCode::from_wire(&raw);
        prop_assert!(!parsed.user_message().is_empty());
        // Known spellings are stable under a round trip.
        prop_assert_eq!(ErrorCode::from_wire(parsed.as_str()), parsed);
    }
}
