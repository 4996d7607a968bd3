use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct Entry {
    expires_at: Instant,
    value: serde_json::Value,
}

/// In-process TTL cache. Constructed once at startup and carried in
/// `AppState`; nothing in the crate reaches for a global instance.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let guard = self.inner.read().await;
        let entry = guard.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    pub async fn set(&self, key: impl Into<String>, value: serde_json::Value, ttl: Duration) {
        let mut guard = self.inner.write().await;
        guard.insert(
            key.into(),
            Entry {
                expires_at: Instant::now() + ttl,
                value,
            },
        );
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    /// Drop every entry under a key prefix. Used when a mutation makes a
    /// whole listing family stale, e.g. any cached product page.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        self.inner
            .write()
            .await
            .retain(|key, _| !key.starts_with(prefix));
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_within_ttl() {
        let cache = Cache::new();
        cache
            .set("k", serde_json::json!({"n": 1}), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!({"n": 1})));
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = Cache::new();
        cache
            .set("k", serde_json::json!(true), Duration::from_millis(0))
            .await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn prefix_invalidation_spares_other_keys() {
        let cache = Cache::new();
        cache
            .set("products:1", serde_json::json!(1), Duration::from_secs(60))
            .await;
        cache
            .set("products:2", serde_json::json!(2), Duration::from_secs(60))
            .await;
        cache
            .set("stores:1", serde_json::json!(3), Duration::from_secs(60))
            .await;

        cache.invalidate_prefix("products:").await;

        assert_eq!(cache.get("products:1").await, None);
        assert_eq!(cache.get("products:2").await, None);
        assert_eq!(cache.get("stores:1").await, Some(serde_json::json!(3)));
    }
}
