//! Availability caching with stale-while-revalidate.
//!
//! Slot lists are cached by the full query key with a short TTL. A hit
//! within the TTL is served as-is; an expired hit is still served
//! immediately, and the flow kicks off one background refresh for it unless
//! the load that found it was itself a retry.

use crate::types::{BookingKind, ExperienceId, Slot, VenueId};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Composite cache key: everything that shapes an availability response.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AvailabilityQuery {
    /// Venue being booked.
    pub venue_id: VenueId,
    /// Experience being booked.
    pub experience_id: ExperienceId,
    /// Requested date.
    pub date: NaiveDate,
    /// Public or private.
    pub booking_kind: BookingKind,
    /// Party size.
    pub party_size: u32,
}

/// Outcome of a cache lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheLookup {
    /// Nothing cached for this key.
    Miss,
    /// Cached within the TTL; serve without fetching.
    Fresh(Vec<Slot>),
    /// Cached but past the TTL; serve immediately and refresh in the
    /// background.
    Stale(Vec<Slot>),
}

#[derive(Clone, Debug)]
struct CacheEntry {
    slots: Vec<Slot>,
    fetched_at: DateTime<Utc>,
}

/// Short-TTL availability cache keyed by [`AvailabilityQuery`].
#[derive(Clone, Debug)]
pub struct AvailabilityCache {
    ttl: chrono::Duration,
    entries: HashMap<AvailabilityQuery, CacheEntry>,
}

impl AvailabilityCache {
    /// Create a cache with the given TTL.
    ///
    /// TTLs beyond ~292 billion years are clamped rather than panicking.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            entries: HashMap::new(),
        }
    }

    /// Look up a query at the given instant.
    #[must_use]
    pub fn lookup(&self, query: &AvailabilityQuery, now: DateTime<Utc>) -> CacheLookup {
        match self.entries.get(query) {
            None => CacheLookup::Miss,
            Some(entry) if now - entry.fetched_at < self.ttl => {
                CacheLookup::Fresh(entry.slots.clone())
            },
            Some(entry) => CacheLookup::Stale(entry.slots.clone()),
        }
    }

    /// Store a fetched slot list.
    pub fn insert(&mut self, query: AvailabilityQuery, slots: Vec<Slot>, now: DateTime<Utc>) {
        self.entries.insert(query, CacheEntry { slots, fetched_at: now });
    }

    /// Drop everything, e.g. after a conflict error proved the cache stale.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for AvailabilityCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
