//! Short-TTL, per-session cache of recent transcript segments.
//!
//! Bounded in length (oldest segments dropped) and in age (one TTL per
//! session entry, counted from the last `set`). Expired entries are a miss
//! and are never served; only `set` creates an entry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::transcript::TranscriptSegment;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in milliseconds
    pub ttl_ms: u64,

    /// Max segments kept per session
    pub max_segments: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 30_000,
            max_segments: 200,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    segments: Vec<TranscriptSegment>,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct SegmentCache {
    ttl: Duration,
    max_segments: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl SegmentCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            ttl: Duration::from_millis(config.ttl_ms),
            max_segments: config.max_segments.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached segments for `session_id`, or `None` if absent or expired
    pub fn get(&self, session_id: &str) -> Option<Vec<TranscriptSegment>> {
        let mut entries = self.lock();
        let expired = entries
            .get(session_id)
            .is_some_and(|entry| entry.inserted_at.elapsed() >= self.ttl);

        if expired {
            debug!("Segment cache entry for {} expired", session_id);
            entries.remove(session_id);
            return None;
        }

        entries.get(session_id).map(|entry| entry.segments.clone())
    }

    /// Replace the entry for `session_id`, keeping only the newest segments.
    /// Expired entries of other sessions are evicted on the way.
    pub fn set(&self, session_id: &str, mut segments: Vec<TranscriptSegment>) {
        if segments.len() > self.max_segments {
            segments.drain(..segments.len() - self.max_segments);
        }

        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        if entries.len() != before {
            debug!("Evicted {} expired segment cache entries", before - entries.len());
        }

        entries.insert(
            session_id.to_string(),
            CacheEntry {
                segments,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Append one segment to a live entry. An absent or expired entry is
    /// left alone so the next `get` misses and the reader goes to the store.
    /// The entry's TTL is not refreshed. Returns whether the segment was cached.
    pub fn append(&self, session_id: &str, segment: TranscriptSegment) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(session_id) else {
            return false;
        };

        if entry.inserted_at.elapsed() >= self.ttl {
            debug!("Segment cache entry for {} expired", session_id);
            entries.remove(session_id);
            return false;
        }

        entry.segments.push(segment);
        if entry.segments.len() > self.max_segments {
            let excess = entry.segments.len() - self.max_segments;
            entry.segments.drain(..excess);
        }
        true
    }

    /// Number of entries held, expired or not
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invalidate(&self, session_id: &str) {
        self.lock().remove(session_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A poisoned cache only holds derived data
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(n: usize) -> Vec<TranscriptSegment> {
        (0..n)
            .map(|i| TranscriptSegment::new("spk_0", format!("line {}", i), i as u64 * 10, i as u64 * 10 + 5))
            .collect()
    }

    #[test]
    fn test_get_is_idempotent_within_ttl() {
        let cache = SegmentCache::new(CacheConfig::default());
        cache.set("s1", segments(3));

        let first = cache.get("s1").unwrap();
        let second = cache.get("s1").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_miss_for_unknown_session() {
        let cache = SegmentCache::new(CacheConfig::default());
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn test_bounded_length_drops_oldest() {
        let cache = SegmentCache::new(CacheConfig {
            ttl_ms: 30_000,
            max_segments: 2,
        });
        cache.set("s1", segments(5));

        let cached = cache.get("s1").unwrap();
        let texts: Vec<_> = cached.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["line 3", "line 4"]);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = SegmentCache::new(CacheConfig {
            ttl_ms: 20,
            max_segments: 10,
        });
        cache.set("s1", segments(1));
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("s1").is_none());
    }

    #[test]
    fn test_append_and_invalidate() {
        let cache = SegmentCache::new(CacheConfig::default());
        assert!(!cache.append("s1", TranscriptSegment::new("a", "hello", 0, 1)));
        assert!(cache.get("s1").is_none());

        cache.set("s1", segments(1));
        assert!(cache.append("s1", TranscriptSegment::new("b", "world", 2, 3)));
        assert_eq!(cache.get("s1").unwrap().len(), 2);

        cache.invalidate("s1");
        assert!(cache.get("s1").is_none());
    }

    #[test]
    fn test_append_does_not_revive_expired_entry() {
        let cache = SegmentCache::new(CacheConfig {
            ttl_ms: 20,
            max_segments: 10,
        });
        cache.set("s1", segments(3));
        std::thread::sleep(Duration::from_millis(40));

        assert!(!cache.append("s1", TranscriptSegment::new("spk_0", "How would you scale it?", 100, 200)));
        assert!(cache.get("s1").is_none());
    }

    #[test]
    fn test_set_evicts_expired_entries() {
        let cache = SegmentCache::new(CacheConfig {
            ttl_ms: 20,
            max_segments: 10,
        });
        cache.set("quiet", segments(2));
        cache.set("also-quiet", segments(2));
        std::thread::sleep(Duration::from_millis(40));

        cache.set("s1", segments(1));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("s1").is_some());
    }
}
