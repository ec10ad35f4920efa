//! Heartbeat tracker: client id -> last seen.
//!
//! Bounded. Expired ids are dropped whenever the map is read, and the
//! oldest id is evicted when a new one arrives at capacity.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_CAPACITY: usize = 10_000;

pub struct PresenceTracker {
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl PresenceTracker {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn touch(&self, id: &str) {
        self.touch_at(id, Instant::now());
    }

    pub fn touch_at(&self, id: &str, now: Instant) {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);

        if !seen.contains_key(id) && seen.len() >= self.capacity {
            let ttl = self.ttl;
            seen.retain(|_, last| now.saturating_duration_since(*last) <= ttl);

            if seen.len() >= self.capacity {
                let oldest = seen
                    .iter()
                    .min_by_key(|(_, last)| **last)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    seen.remove(&oldest);
                }
            }
        }

        seen.insert(id.to_string(), now);
    }

    pub fn online(&self) -> usize {
        self.online_at(Instant::now())
    }

    pub fn online_at(&self, now: Instant) -> usize {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        seen.retain(|_, last| now.saturating_duration_since(*last) <= ttl);
        seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_heartbeats_count_once() {
        let tracker = PresenceTracker::default();
        tracker.touch("a");
        tracker.touch("a");
        tracker.touch("b");
        assert_eq!(tracker.online(), 2);
    }

    #[test]
    fn test_expired_entries_evicted_on_read() {
        let tracker = PresenceTracker::new(Duration::from_secs(10), 100);
        let start = Instant::now();
        tracker.touch_at("old", start);
        tracker.touch_at("fresh", start + Duration::from_secs(8));

        assert_eq!(tracker.online_at(start + Duration::from_secs(9)), 2);
        assert_eq!(tracker.online_at(start + Duration::from_secs(15)), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let tracker = PresenceTracker::new(Duration::from_secs(60), 2);
        let start = Instant::now();
        tracker.touch_at("a", start);
        tracker.touch_at("b", start + Duration::from_secs(1));
        tracker.touch_at("c", start + Duration::from_secs(2));

        let now = start + Duration::from_secs(3);
        assert_eq!(tracker.online_at(now), 2);
        // "a" was the oldest; re-adding it must evict "b"
        tracker.touch_at("a", now);
        assert_eq!(tracker.online_at(now), 2);
    }
}
