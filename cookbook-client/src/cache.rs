use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{Arc, Mutex},
};

use futures03::Future;
use metrics::counter;
use tokio::sync::OnceCell;
use tracing::{instrument, trace, Level};

/// Memoises one value per key, typically a client that is expensive to build.
///
/// Initialisation is single-flight: concurrent first uses of a key all await the same
/// construction. A failed construction leaves the key empty so the next caller retries it.
pub struct ClientCache<K, V> {
    name: String,
    entries: Mutex<HashMap<K, Arc<OnceCell<Arc<V>>>>>,
}

impl<K, V> ClientCache<K, V>
where
    K: Clone + Hash + Eq + Debug + Send + Sync,
    V: Send + Sync,
{
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), entries: Mutex::new(HashMap::new()) }
    }

    fn cell(&self, key: &K) -> Arc<OnceCell<Arc<V>>> {
        // a poisoned map only means another caller panicked while holding the lock; the map
        // itself is still consistent
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .entry(key.clone())
            .or_default()
            .clone()
    }

    #[instrument(
        name = "client.cache.get",
        level = Level::TRACE,
        fields(resource = self.name),
        skip(self, init))
    ]
    pub async fn get_or_try_init<E, F, Fut>(&self, key: K, init: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cell(&key);
        if let Some(value) = cell.get() {
            trace!("CacheHit");
            counter!("client_cache_hits", "cache" => self.name.clone()).increment(1);
            return Ok(value.clone());
        }

        let value = cell
            .get_or_try_init(|| async move {
                trace!("CacheMiss");
                counter!("client_cache_misses", "cache" => self.name.clone()).increment(1);
                init(key).await.map(Arc::new)
            })
            .await?;
        Ok(value.clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use futures03::future::try_join_all;

    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_concurrent_first_use_builds_once() {
        let cache = Arc::new(ClientCache::<&'static str, String>::new("test"));
        let builds = Arc::new(AtomicUsize::new(0));

        let requests = (0..8).map(|_| {
            let cache = cache.clone();
            let builds = builds.clone();
            async move {
                cache
                    .get_or_try_init("quickswap", |key| async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(format!("client for {key}"))
                    })
                    .await
            }
        });
        let results = try_join_all(requests)
            .await
            .unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(results
            .iter()
            .all(|r| r.as_str() == "client for quickswap"));
        assert_eq!(cache.len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_init_is_not_cached() {
        let cache = ClientCache::<u8, u8>::new("test");

        let first = cache
            .get_or_try_init(1, |_| async { Err::<u8, _>("unreachable".to_string()) })
            .await;
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second = cache
            .get_or_try_init(1, |_| async { Ok::<_, String>(7) })
            .await
            .unwrap();
        assert_eq!(*second, 7);
    }

    #[test_log::test(tokio::test)]
    async fn test_keys_are_independent() {
        let cache = ClientCache::<u8, u8>::new("test");

        let a = cache
            .get_or_try_init(1, |k| async move { Ok::<_, String>(k * 10) })
            .await
            .unwrap();
        let b = cache
            .get_or_try_init(2, |k| async move { Ok::<_, String>(k * 10) })
            .await
            .unwrap();

        assert_eq!((*a, *b), (10, 20));
        assert_eq!(cache.len(), 2);
    }
}
