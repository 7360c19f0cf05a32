//! Session persistence.
//!
//! The full flow state serializes into a [`SessionSnapshot`] after every
//! transition (coalesced by the reducer) and lands in a [`SessionStore`]
//! under a key namespaced by venue and session. Restoration never trusts
//! stored state blindly: expired holds are discarded, version mismatches
//! read as absent, and the current step is re-derived from which fields are
//! populated rather than from anything persisted.

use crate::types::{
    BookingKind, BookingRef, Customer, ExperienceId, GiftCardApplication, Hold, HoldId,
    PromoApplication, SessionId, VenueId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Bumped whenever the snapshot shape changes incompatibly; older snapshots
/// then read as absent instead of deserializing into nonsense.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Failures from the persistence layer.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The snapshot could not be encoded or decoded.
    #[error("snapshot codec failure")]
    Codec(#[from] serde_json::Error),

    /// The backing store rejected the operation.
    #[error("storage unavailable: {0}")]
    Storage(String),
}

/// Durable string-keyed storage, typically backed by the host platform's
/// local storage.
pub trait SessionStore: Send + Sync {
    /// Read a record.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Storage`] if the backing store is
    /// unreachable.
    fn load(&self, key: &str) -> Result<Option<String>, SnapshotError>;

    /// Write a record.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Storage`] if the write is rejected, e.g. on
    /// quota exhaustion.
    fn save(&self, key: &str, value: &str) -> Result<(), SnapshotError>;

    /// Delete a record. Deleting a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Storage`] if the backing store is
    /// unreachable.
    fn remove(&self, key: &str) -> Result<(), SnapshotError>;
}

/// Storage key for the session snapshot of one (venue, session) pair.
#[must_use]
pub fn session_key(venue: VenueId, session: SessionId) -> String {
    format!("bookflow:session:{venue}:{session}")
}

/// Storage key for the venue's presentation preference.
#[must_use]
pub fn preference_key(venue: VenueId) -> String {
    format!("bookflow:preference:{venue}")
}

/// How the booking surface prefers to present slot choices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationPreference {
    /// Calendar grid.
    #[default]
    Calendar,
    /// Flat list of times.
    List,
}

/// The serialized union of everything the flow needs to resume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Snapshot schema version.
    pub version: u32,
    /// Venue this session belongs to.
    pub venue_id: VenueId,
    /// Session identity, namespaces the storage key.
    pub session_id: SessionId,
    /// Selected experience, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_experience: Option<ExperienceId>,
    /// Selected date, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_date: Option<NaiveDate>,
    /// Current booking kind.
    pub booking_kind: BookingKind,
    /// Current party size.
    pub party_size: u32,
    /// The active hold, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold: Option<Hold>,
    /// Promo state scoped to the hold.
    #[serde(default)]
    pub promo: PromoApplication,
    /// Checked gift card, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gift_card: Option<GiftCardApplication>,
    /// Contact details collected so far.
    #[serde(default)]
    pub customer: Customer,
    /// Confirmed booking, if the flow finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingRef>,
    /// Hold awaiting confirmation across a payment redirect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_redirect: Option<HoldId>,
    /// When this snapshot was written.
    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Discard anything that must not survive a restore: a hold past its
    /// expiry goes away together with the promo and gift-card state scoped
    /// to it, and a redirect marker for that hold is meaningless without it.
    #[must_use]
    pub fn sanitized(mut self, now: DateTime<Utc>) -> Self {
        if let Some(hold) = &self.hold {
            if hold.is_expired(now) {
                tracing::info!(hold_id = %hold.hold_id, "discarding expired hold on restore");
                self.hold = None;
                self.promo = PromoApplication::default();
                self.gift_card = None;
                self.pending_redirect = None;
            }
        } else {
            self.promo = PromoApplication::default();
        }
        self
    }
}

/// Load and decode the snapshot for a (venue, session) pair.
///
/// A missing record, a version mismatch, or an undecodable body all read as
/// `None`: stored state can desync from code across versions, and starting
/// fresh beats crashing.
#[must_use]
pub fn load_snapshot(
    store: &dyn SessionStore,
    venue: VenueId,
    session: SessionId,
) -> Option<SessionSnapshot> {
    let raw = match store.load(&session_key(venue, session)) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(error = %err, "session store unreadable, starting fresh");
            return None;
        },
    };

    match serde_json::from_str::<SessionSnapshot>(&raw) {
        Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Some(snapshot),
        Ok(snapshot) => {
            tracing::info!(
                found = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "snapshot version mismatch, starting fresh"
            );
            None
        },
        Err(err) => {
            tracing::warn!(error = %err, "undecodable snapshot, starting fresh");
            None
        },
    }
}

/// Encode and write a snapshot.
///
/// # Errors
///
/// Returns [`SnapshotError`] on codec or storage failure; callers treat both
/// as non-fatal.
pub fn save_snapshot(store: &dyn SessionStore, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
    let key = session_key(snapshot.venue_id, snapshot.session_id);
    let encoded = serde_json::to_string(snapshot)?;
    store.save(&key, &encoded)
}

/// Load the presentation preference, defaulting when absent or undecodable.
#[must_use]
pub fn load_preference(store: &dyn SessionStore, venue: VenueId) -> PresentationPreference {
    store
        .load(&preference_key(venue))
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

/// Persist the presentation preference.
///
/// # Errors
///
/// Returns [`SnapshotError`] on codec or storage failure.
pub fn save_preference(
    store: &dyn SessionStore,
    venue: VenueId,
    preference: PresentationPreference,
) -> Result<(), SnapshotError> {
    let encoded = serde_json::to_string(&preference)?;
    store.save(&preference_key(venue), &encoded)
}

/// In-memory [`SessionStore`] for tests and headless hosts.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        let records = self
            .records
            .lock()
            .map_err(|_| SnapshotError::Storage("memory store poisoned".to_owned()))?;
        Ok(records.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| SnapshotError::Storage("memory store poisoned".to_owned()))?;
        records.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SnapshotError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| SnapshotError::Storage("memory store poisoned".to_owned()))?;
        records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{HoldStatus, Money, PricingSnapshot, ResourceId};
    use bookflow_testing::test_epoch;

    fn pricing() -> PricingSnapshot {
        PricingSnapshot {
            currency: "USD".to_owned(),
            subtotal: Money::from_minor(6_000),
            processing_fee: Money::from_minor(300),
            discount: None,
            total: Money::from_minor(6_300),
        }
    }

    fn hold(expires_at: DateTime<Utc>) -> Hold {
        Hold {
            hold_id: HoldId::new(),
            resource_id: ResourceId::new(),
            start_at: test_epoch() + chrono::Duration::hours(4),
            end_at: test_epoch() + chrono::Duration::hours(5),
            party_size: 2,
            booking_kind: BookingKind::Public,
            status: HoldStatus::Active,
            created_at: test_epoch(),
            expires_at,
            pricing: pricing(),
        }
    }

    fn snapshot(hold: Option<Hold>) -> SessionSnapshot {
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            venue_id: VenueId::new(),
            session_id: SessionId::new(),
            selected_experience: Some(ExperienceId::new()),
            selected_date: None,
            booking_kind: BookingKind::Public,
            party_size: 2,
            hold,
            promo: PromoApplication {
                code: "SAVE10".to_owned(),
                status: crate::types::PromoStatus::Valid,
                message: None,
                applied_code: Some("SAVE10".to_owned()),
            },
            gift_card: None,
            customer: Customer::default(),
            booking: None,
            pending_redirect: None,
            saved_at: test_epoch(),
        }
    }

    #[test]
    fn snapshot_round_trips_through_the_store() {
        let store = MemorySessionStore::new();
        let original = snapshot(Some(hold(test_epoch() + chrono::Duration::minutes(10))));

        save_snapshot(&store, &original).unwrap();
        let restored = load_snapshot(&store, original.venue_id, original.session_id).unwrap();

        assert_eq!(restored, original);
    }

    #[test]
    fn sanitize_keeps_live_hold() {
        let live = snapshot(Some(hold(test_epoch() + chrono::Duration::minutes(10))));
        let sanitized = live.clone().sanitized(test_epoch());
        assert_eq!(sanitized.hold, live.hold);
        assert_eq!(sanitized.promo.applied_code.as_deref(), Some("SAVE10"));
    }

    #[test]
    fn sanitize_discards_expired_hold_and_its_scope() {
        let stale = snapshot(Some(hold(test_epoch() - chrono::Duration::minutes(1))));
        let sanitized = stale.sanitized(test_epoch());
        assert!(sanitized.hold.is_none());
        assert_eq!(sanitized.promo, PromoApplication::default());
        assert!(sanitized.gift_card.is_none());
        assert!(sanitized.pending_redirect.is_none());
    }

    #[test]
    fn version_mismatch_reads_as_absent() {
        let store = MemorySessionStore::new();
        let mut old = snapshot(None);
        old.version = 0;
        let key = session_key(old.venue_id, old.session_id);
        store
            .save(&key, &serde_json::to_string(&old).unwrap())
            .unwrap();

        assert!(load_snapshot(&store, old.venue_id, old.session_id).is_none());
    }

    #[test]
    fn garbage_record_reads_as_absent() {
        let store = MemorySessionStore::new();
        let venue = VenueId::new();
        let session = SessionId::new();
        store
            .save(&session_key(venue, session), "{not json")
            .unwrap();

        assert!(load_snapshot(&store, venue, session).is_none());
    }

    #[test]
    fn preference_record_is_separate_from_the_session() {
        let store = MemorySessionStore::new();
        let venue = VenueId::new();

        assert_eq!(load_preference(&store, venue), PresentationPreference::Calendar);
        save_preference(&store, venue, PresentationPreference::List).unwrap();
        assert_eq!(load_preference(&store, venue), PresentationPreference::List);

        // The preference key never collides with a session key.
        assert!(load_snapshot(&store, venue, SessionId::new()).is_none());
    }
}
