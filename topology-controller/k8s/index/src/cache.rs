//! A TTL-keyed response cache shared by every fetch operation.
//!
//! Values are stored type-erased so one store serves all resource kinds.
//! Expiry happens on read; there is no background eviction. Memory stays
//! bounded by the number of distinct (kind, namespace) keys in use.

use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use std::{
    any::Any,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::trace;

#[derive(Debug)]
pub struct Cache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

#[derive(Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("stored_at", &self.stored_at)
            .finish_non_exhaustive()
    }
}

// === impl Cache ===

impl Cache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::default()),
        }
    }

    /// Returns the cached value for `key` unless it is absent, stale, or of
    /// another type.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            trace!(key, "cache entry expired");
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    /// Atomically replaces the entry for `key`.
    pub fn set<T: Clone + Send + Sync + 'static>(&self, key: impl ToString, value: T) {
        let entry = Entry {
            value: Arc::new(value),
            stored_at: Instant::now(),
        };
        self.entries.write().insert(key.to_string(), entry);
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Drops every entry whose key starts with `prefix`. Used to force
    /// topology recomputation when a watched policy changes.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.write().retain(|k, _| !k.starts_with(prefix));
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_typed_values() {
        let cache = Cache::default();
        cache.set("services:default", vec!["web".to_string()]);

        assert_eq!(
            cache.get::<Vec<String>>("services:default"),
            Some(vec!["web".to_string()])
        );
        assert_eq!(cache.get::<Vec<String>>("services:other"), None);
        // A type mismatch is a miss, not a panic.
        assert_eq!(cache.get::<String>("services:default"), None);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = Cache::new(Duration::ZERO);
        cache.set("k", 1u32);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get::<u32>("k"), None);
    }

    #[test]
    fn set_replaces_atomically() {
        let cache = Cache::default();
        cache.set("k", 1u32);
        cache.set("k", 2u32);
        assert_eq!(cache.get::<u32>("k"), Some(2));
    }

    #[test]
    fn invalidation() {
        let cache = Cache::default();
        cache.set("topology:ns1", 1u32);
        cache.set("topology:ns2", 2u32);
        cache.set("services:ns1", 3u32);

        cache.invalidate("topology:ns1");
        assert_eq!(cache.get::<u32>("topology:ns1"), None);
        assert_eq!(cache.get::<u32>("topology:ns2"), Some(2));

        cache.invalidate_prefix("topology:");
        assert_eq!(cache.get::<u32>("topology:ns2"), None);
        assert_eq!(cache.get::<u32>("services:ns1"), Some(3));

        cache.clear();
        assert_eq!(cache.get::<u32>("services:ns1"), None);
    }

    #[tokio::test]
    async fn concurrent_readers_and_writers() {
        let cache = Arc::new(Cache::default());
        let mut tasks = Vec::new();
        for i in 0..8u32 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                for j in 0..100u32 {
                    cache.set(format!("k{}", i % 4), j);
                    let _ = cache.get::<u32>(&format!("k{}", (i + 1) % 4));
                }
            }));
        }
        for task in tasks {
            task.await.expect("cache task must not panic");
        }
    }
}
