//! Latest-value cache
//!
//! Holds the most recently accepted reading per location. Written by the
//! ingestion coordinator, read concurrently by query handlers.
//!
//! Entries are `Arc<Reading>` and are replaced whole, so a reader either
//! sees the previous reading or the new one, never a mix. Arrival order is
//! the only ordering: a late reading with an older event timestamp still
//! overwrites the entry.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, FixedOffset};
use dashmap::DashMap;
use tracing::debug;
use types::ids::LocationId;
use types::reading::Reading;

#[derive(Debug, Default)]
pub struct LatestCache {
    by_location: DashMap<LocationId, Arc<Reading>>,
    /// Most recent arrival across all locations.
    most_recent: RwLock<Option<Arc<Reading>>>,
}

impl LatestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `reading.location`.
    pub fn update(&self, reading: Reading) {
        let reading = Arc::new(reading);
        debug!(location = %reading.location, "Cache entry replaced");

        self.by_location
            .insert(reading.location.clone(), Arc::clone(&reading));

        match self.most_recent.write() {
            Ok(mut slot) => *slot = Some(reading),
            // A panicked writer cannot leave a half-written Arc behind.
            Err(poisoned) => *poisoned.into_inner() = Some(reading),
        }
    }

    /// Latest reading for a location, if any has arrived.
    pub fn get(&self, location: &LocationId) -> Option<Arc<Reading>> {
        self.by_location
            .get(location)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Latest reading across all locations, if any has arrived.
    pub fn most_recent(&self) -> Option<Arc<Reading>> {
        match self.most_recent.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Latest reading for a location, or the "unknown" placeholder.
    pub fn get_or_placeholder(&self, location: &LocationId, now: DateTime<FixedOffset>) -> Reading {
        self.get(location)
            .map(|r| r.as_ref().clone())
            .unwrap_or_else(|| Reading::unknown(now))
    }

    /// Number of locations with an entry.
    pub fn len(&self) -> usize {
        self.by_location.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_location.is_empty()
    }

    /// All locations that have reported.
    pub fn locations(&self) -> Vec<LocationId> {
        let mut locations: Vec<LocationId> =
            self.by_location.iter().map(|e| e.key().clone()).collect();
        locations.sort();
        locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use types::reading::parse_timestamp;

    fn reading(location: &str, temperature: f64, ts: &str) -> Reading {
        Reading::new(
            LocationId::new(location),
            temperature,
            50.0,
            parse_timestamp(ts).unwrap(),
        )
    }

    #[test]
    fn test_get_unknown_location() {
        let cache = LatestCache::new();
        assert!(cache.get(&LocationId::new("bridgeA")).is_none());
        assert!(cache.most_recent().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_placeholder_for_missing_location() {
        let cache = LatestCache::new();
        let now = parse_timestamp("2025-08-20T10:00:00+00:00").unwrap();
        let placeholder = cache.get_or_placeholder(&LocationId::new("bridgeA"), now);
        assert_eq!(placeholder, Reading::unknown(now));
    }

    #[test]
    fn test_last_arrival_wins_over_event_time() {
        let cache = LatestCache::new();
        let newer = reading("bridgeA", 31.0, "2025-08-20T19:45:00+09:00");
        let older = reading("bridgeA", 29.0, "2025-08-20T19:15:00+09:00");

        cache.update(newer);
        cache.update(older.clone());

        let got = cache.get(&LocationId::new("bridgeA")).unwrap();
        assert_eq!(*got, older);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_locations_are_independent() {
        let cache = LatestCache::new();
        let a = reading("bridgeA", 30.0, "2025-08-20T19:30:30+09:00");
        let b = reading("tunnelB", 12.5, "2025-08-20T19:31:00+09:00");

        cache.update(a.clone());
        cache.update(b.clone());

        assert_eq!(*cache.get(&LocationId::new("bridgeA")).unwrap(), a);
        assert_eq!(*cache.get(&LocationId::new("tunnelB")).unwrap(), b);
        assert_eq!(*cache.most_recent().unwrap(), b);
        assert_eq!(
            cache.locations(),
            vec![LocationId::new("bridgeA"), LocationId::new("tunnelB")]
        );
    }

    #[test]
    fn test_concurrent_readers_see_whole_values() {
        let cache = Arc::new(LatestCache::new());
        let location = LocationId::new("bridgeA");

        let writer = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..2_000 {
                    let t = i as f64;
                    // humidity mirrors temperature so torn values are detectable
                    cache.update(Reading::new(
                        LocationId::new("bridgeA"),
                        t,
                        t,
                        parse_timestamp("2025-08-20T19:30:30+09:00").unwrap(),
                    ));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let location = location.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        if let Some(r) = cache.get(&location) {
                            assert_eq!(r.temperature, r.humidity);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }

        assert_eq!(cache.get(&location).unwrap().temperature, 1_999.0);
    }
}
