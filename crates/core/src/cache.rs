//! Question Cache
//!
//! Remembers generated questions per (role, requirements) pair for 24 hours so
//! repeating a practice run does not spend another generation. The whole map
//! is written to durable storage as a single JSON blob on every write.

use crate::error::CacheError;
use crate::ports::{Clock, KeyValueStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Storage key holding the serialized cache map.
pub const CACHE_STORAGE_KEY: &str = "interview_questions_cache";

pub const CACHE_TTL_HOURS: i64 = 24;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub questions: Vec<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub job_type: String,
    pub requirements: String,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.timestamp_millis() - self.timestamp < ttl.num_milliseconds()
    }
}

/// Normalized lookup key for a (role, requirements) pair.
pub fn cache_key(job_type: &str, requirements: &str) -> String {
    format!(
        "{}_{}",
        job_type.trim().to_lowercase(),
        requirements.trim().to_lowercase()
    )
}

pub struct QuestionCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl QuestionCache {
    /// Loads the persisted map and drops every entry that already expired.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let entries = match store.load(CACHE_STORAGE_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding unreadable question cache");
                HashMap::new()
            }),
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load question cache");
                HashMap::new()
            }
        };
        let cache = Self {
            store,
            clock,
            ttl: Duration::hours(CACHE_TTL_HOURS),
            entries: Mutex::new(entries),
        };
        let removed = cache.clean_expired();
        if removed > 0 {
            info!(removed, "Removed expired question cache entries");
        }
        cache
    }

    /// Returns cached questions for the pair if they are younger than the TTL.
    /// An expired entry is evicted and reported as a miss.
    pub fn get(&self, job_type: &str, requirements: &str) -> Option<Vec<String>> {
        let key = cache_key(job_type, requirements);
        let now = self.clock.now();
        let mut entries = self.lock();

        let fresh = entries.get(&key)?.is_fresh(now, self.ttl);
        if fresh {
            debug!(%key, "Question cache hit");
            return entries.get(&key).map(|e| e.questions.clone());
        }

        debug!(%key, "Question cache entry expired");
        entries.remove(&key);
        if let Err(e) = self.persist(&entries) {
            warn!(error = %e, "Failed to persist question cache after eviction");
        }
        None
    }

    /// Stores questions for the pair and persists the whole map.
    pub fn set(
        &self,
        job_type: &str,
        requirements: &str,
        questions: Vec<String>,
    ) -> Result<(), CacheError> {
        let key = cache_key(job_type, requirements);
        let entry = CacheEntry {
            questions,
            timestamp: self.clock.now().timestamp_millis(),
            job_type: job_type.to_string(),
            requirements: requirements.to_string(),
        };
        let mut entries = self.lock();
        entries.insert(key, entry);
        self.persist(&entries)
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn clean_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, self.ttl));
        let removed = before - entries.len();
        if removed > 0 {
            if let Err(e) = self.persist(&entries) {
                warn!(error = %e, "Failed to persist question cache after cleanup");
            }
        }
        removed
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.lock();
        entries.clear();
        self.store.remove(CACHE_STORAGE_KEY)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
        let raw = serde_json::to_string(entries)?;
        self.store.save(CACHE_STORAGE_KEY, &raw)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A poisoned map is still structurally valid.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ManualClock, MemoryStore};

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, QuestionCache) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = QuestionCache::new(store.clone(), clock.clone());
        (store, clock, cache)
    }

    #[test]
    fn test_cache_key_is_normalized() {
        assert_eq!(cache_key("  Dev ", "React 5YRS "), "dev_react 5yrs");
        assert_eq!(cache_key("dev", "react 5yrs"), cache_key("DEV", " React 5yrs"));
    }

    #[test]
    fn test_get_within_ttl_returns_questions() {
        let (_, clock, cache) = setup();
        cache.set("dev", "react 5yrs", vec!["Q1".into()]).unwrap();
        clock.advance(Duration::hours(23));
        assert_eq!(cache.get("dev", "react 5yrs"), Some(vec!["Q1".to_string()]));
        assert_eq!(cache.get("Dev", "React 5yrs"), Some(vec!["Q1".to_string()]));
    }

    #[test]
    fn test_get_after_ttl_is_a_miss_and_evicts() {
        let (store, clock, cache) = setup();
        cache.set("dev", "react 5yrs", vec!["Q1".into()]).unwrap();
        clock.advance(Duration::hours(24) + Duration::seconds(1));

        assert_eq!(cache.get("dev", "react 5yrs"), None);
        assert!(cache.is_empty());

        let persisted = store.load(CACHE_STORAGE_KEY).unwrap().unwrap();
        let map: HashMap<String, CacheEntry> = serde_json::from_str(&persisted).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_set_persists_whole_map() {
        let (store, _, cache) = setup();
        cache.set("dev", "react", vec!["Q1".into()]).unwrap();
        cache.set("qa", "selenium", vec!["Q2".into()]).unwrap();

        let persisted = store.load(CACHE_STORAGE_KEY).unwrap().unwrap();
        let map: HashMap<String, CacheEntry> = serde_json::from_str(&persisted).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["qa_selenium"].job_type, "qa");
        assert_eq!(map["dev_react"].questions, vec!["Q1"]);
    }

    #[test]
    fn test_set_overwrites_existing_entry() {
        let (_, _, cache) = setup();
        cache.set("dev", "react", vec!["Q1".into()]).unwrap();
        cache.set("DEV", "react", vec!["Q9".into()]).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("dev", "react"), Some(vec!["Q9".to_string()]));
    }

    #[test]
    fn test_expired_entries_dropped_on_load() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        {
            let cache = QuestionCache::new(store.clone(), clock.clone());
            cache.set("old", "role", vec!["Q1".into()]).unwrap();
            clock.advance(Duration::hours(12));
            cache.set("new", "role", vec!["Q2".into()]).unwrap();
        }
        clock.advance(Duration::hours(13));

        let reloaded = QuestionCache::new(store.clone(), clock.clone());
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("new", "role"), Some(vec!["Q2".to_string()]));
    }

    #[test]
    fn test_clean_expired_counts_removed() {
        let (_, clock, cache) = setup();
        cache.set("a", "1", vec!["Q".into()]).unwrap();
        cache.set("b", "2", vec!["Q".into()]).unwrap();
        clock.advance(Duration::hours(24));
        assert_eq!(cache.clean_expired(), 2);
        assert_eq!(cache.clean_expired(), 0);
    }

    #[test]
    fn test_corrupt_blob_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.save(CACHE_STORAGE_KEY, "{not json").unwrap();
        let cache = QuestionCache::new(store, Arc::new(ManualClock::new(Utc::now())));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_removes_persisted_blob() {
        let (store, _, cache) = setup();
        cache.set("dev", "react", vec!["Q1".into()]).unwrap();
        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert_eq!(store.load(CACHE_STORAGE_KEY).unwrap(), None);
    }
}
