//! Read-through cache for reference lists.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

/// Holds one list, loaded on first read and kept until the TTL runs out or
/// the write path calls [`ListCache::invalidate`].
///
/// Entries are keyed by a generation counter. `invalidate` bumps it before
/// clearing, so a load that was already running when the write landed stores
/// its result under a generation nobody reads again.
#[derive(Clone)]
pub struct ListCache<V> {
    generation: Arc<AtomicU64>,
    entries: Cache<u64, V>,
}

impl<V> ListCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(4)
            .time_to_live(ttl)
            .build();
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            entries,
        }
    }

    fn current(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn get(&self) -> Option<V> {
        self.entries.get(&self.current()).await
    }

    /// Concurrent misses share one `load`. A failed load is not cached.
    pub async fn get_or_try_load<F, E>(&self, load: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        self.entries.try_get_with(self.current(), load).await
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn loads_once_until_invalidated() {
        let cache: ListCache<Vec<String>> = ListCache::new(Duration::from_secs(60));
        let loads = AtomicUsize::new(0);
        let load = || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(vec!["Backend".to_string()])
        };

        let first = tokio_test::block_on(cache.get_or_try_load(load())).unwrap();
        let second = tokio_test::block_on(cache.get_or_try_load(load())).unwrap();
        assert_eq!(first, second);
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.invalidate();
        tokio_test::block_on(cache.get_or_try_load(load())).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let cache: ListCache<u8> = ListCache::new(Duration::from_secs(60));

        let err = tokio_test::block_on(cache.get_or_try_load(async { Err::<u8, _>("down") }));
        assert_eq!(err.map_err(|e| *e), Err("down"));
        assert_eq!(tokio_test::block_on(cache.get()), None);
    }

    #[test]
    fn write_during_a_load_discards_the_loaded_list() {
        let cache: ListCache<&'static str> = ListCache::new(Duration::from_secs(3600));
        let writer = cache.clone();

        let loaded = tokio_test::block_on(cache.get_or_try_load(async {
            writer.invalidate();
            Ok::<_, ()>("old-list")
        }))
        .unwrap();

        assert_eq!(loaded, "old-list");
        assert_eq!(tokio_test::block_on(cache.get()), None);

        let fresh =
            tokio_test::block_on(cache.get_or_try_load(async { Ok::<_, ()>("new-list") })).unwrap();
        assert_eq!(fresh, "new-list");
    }
}
