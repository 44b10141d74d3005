//! Memoized reachability results, one entry per `(owner, repo, sha)`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::debug;

use crate::reference::CacheKey;

/// Caches whether a commit is reachable in a given repository.
///
/// Scoped to a single run and passed explicitly to the checker. Each key
/// owns a [`OnceCell`]: concurrent requests for the same key wait on the
/// single in-flight computation instead of starting their own. Only
/// successful results are stored, so a transport failure is retried by the
/// next request for that key.
#[derive(Debug, Default)]
pub struct ReachabilityCache {
    entries: Mutex<HashMap<CacheKey, Arc<OnceCell<bool>>>>,
}

impl ReachabilityCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for `key`, running `compute` on a miss.
    ///
    /// # Errors
    ///
    /// Returns the error from `compute`; nothing is stored in that case.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &CacheKey, compute: F) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let cell = {
            let mut entries = self.entries.lock().expect("cache lock poisoned");
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        if let Some(reachable) = cell.get() {
            debug!(%key, reachable, "reachability cache hit");
            return Ok(*reachable);
        }

        cell.get_or_try_init(|| {
            debug!(%key, "reachability cache miss");
            compute()
        })
        .await
        .copied()
    }

    /// Look up a stored result without computing anything.
    #[cfg(test)]
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<bool> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries.get(key).and_then(|cell| cell.get().copied())
    }

    /// Number of keys with a stored result.
    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries.values().filter(|cell| cell.initialized()).count()
    }

    /// Returns `true` if no result has been stored yet.
    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn key(sha: &str) -> CacheKey {
        CacheKey { owner: "acme".into(), repo: "tool".into(), sha: sha.into() }
    }

    #[tokio::test]
    async fn hit_skips_recomputation() {
        let cache = ReachabilityCache::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(true)
        };

        assert_eq!(cache.get_or_compute(&key("a"), compute).await, Ok(true));
        assert_eq!(cache.get_or_compute(&key("a"), compute).await, Ok(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&key("a")), Some(true));
    }

    #[tokio::test]
    async fn negative_results_are_cached_too() {
        let cache = ReachabilityCache::new();
        let first = cache.get_or_compute(&key("a"), || async { Ok::<_, String>(false) }).await;
        assert_eq!(first, Ok(false));
        let second = cache
            .get_or_compute(&key("a"), || async { Err::<bool, _>("must not run".to_string()) })
            .await;
        assert_eq!(second, Ok(false));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = ReachabilityCache::new();
        let failed = cache
            .get_or_compute(&key("a"), || async { Err::<bool, _>("timeout".to_string()) })
            .await;
        assert_eq!(failed, Err("timeout".to_string()));
        assert_eq!(cache.get(&key("a")), None);
        assert!(cache.is_empty());

        let retried = cache.get_or_compute(&key("a"), || async { Ok::<_, String>(true) }).await;
        assert_eq!(retried, Ok(true));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_are_independent() {
        let cache = ReachabilityCache::new();
        let _ = cache.get_or_compute(&key("a"), || async { Ok::<_, String>(true) }).await;
        let b = cache.get_or_compute(&key("b"), || async { Ok::<_, String>(false) }).await;
        assert_eq!(b, Ok(false));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_computation() {
        let cache = Arc::new(ReachabilityCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                let calls = &*calls;
                cache
                    .get_or_compute(&key("shared"), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(true)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(true));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
