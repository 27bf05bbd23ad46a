//! Time-bounded in-memory observation cache.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use flightwx_core::models::WeatherObservation;

/// Cache key: coordinates quantized to two decimal places (~1 km) and
/// timestamps to ten-minute buckets, so nearby requests inside the same
/// window share an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat_e2: i32,
    lon_e2: i32,
    bucket: i64,
}

const TIME_BUCKET_SECS: i64 = 600;

impl CacheKey {
    pub fn quantize(lat: f64, lon: f64, at: DateTime<Utc>) -> Self {
        Self {
            lat_e2: (lat * 100.0).round() as i32,
            lon_e2: (lon * 100.0).round() as i32,
            bucket: at.timestamp().div_euclid(TIME_BUCKET_SECS),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedObservation {
    observation: WeatherObservation,
    fetched_at: Instant,
}

/// TTL + size-bounded observation cache.
#[derive(Debug)]
pub struct ObservationCache {
    entries: DashMap<CacheKey, CachedObservation>,
    ttl: Duration,
    max_entries: usize,
}

impl ObservationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<WeatherObservation> {
        let entry = self.entries.get(key)?;
        if entry.fetched_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.observation.clone())
    }

    pub fn insert(&self, key: CacheKey, observation: WeatherObservation) {
        self.entries.insert(
            key,
            CachedObservation {
                observation,
                fetched_at: Instant::now(),
            },
        );
        self.prune();
    }

    /// Drop expired entries, then oldest-first until under the size cap.
    fn prune(&self) {
        let now = Instant::now();
        let mut entries: Vec<(CacheKey, Instant)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().fetched_at))
            .collect();

        for (key, fetched_at) in &entries {
            if now.duration_since(*fetched_at) > self.ttl {
                self.entries.remove(key);
            }
        }

        if self.entries.len() <= self.max_entries {
            return;
        }

        entries.sort_by_key(|(_, fetched_at)| *fetched_at);
        for (key, _) in entries {
            if self.entries.len() <= self.max_entries {
                break;
            }
            self.entries.remove(&key);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs() -> WeatherObservation {
        WeatherObservation {
            visibility_mi: 10.0,
            ceiling_ft: 12_000.0,
            wind_kt: 5.0,
            wind_gust_kt: None,
            phenomena: Vec::new(),
        }
    }

    #[test]
    fn nearby_requests_share_a_key() {
        let at = Utc.with_ymd_and_hms(2025, 6, 2, 15, 2, 0).unwrap();
        let a = CacheKey::quantize(33.6812, -117.8703, at);
        let b = CacheKey::quantize(33.6808, -117.8698, at + chrono::Duration::minutes(3));
        assert_eq!(a, b);
    }

    #[test]
    fn distant_requests_do_not() {
        let at = Utc.with_ymd_and_hms(2025, 6, 2, 15, 2, 0).unwrap();
        let a = CacheKey::quantize(33.68, -117.87, at);
        let b = CacheKey::quantize(33.75, -117.87, at);
        let c = CacheKey::quantize(33.68, -117.87, at + chrono::Duration::minutes(30));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = ObservationCache::new(Duration::from_millis(10), 16);
        let at = Utc::now();
        let key = CacheKey::quantize(33.68, -117.87, at);

        cache.insert(key, obs());
        assert!(cache.get(&key).is_some());

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn cache_is_size_bounded() {
        let cache = ObservationCache::new(Duration::from_secs(60), 4);
        let at = Utc::now();
        for i in 0..10 {
            let key = CacheKey::quantize(30.0 + i as f64, -117.0, at);
            cache.insert(key, obs());
        }
        assert!(cache.len() <= 4);
    }
}
