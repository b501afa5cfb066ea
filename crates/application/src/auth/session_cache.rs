//! Short-lived cache in front of the session store.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tally_domain::{AuthError, Session};
use tokio::time::Instant;
use tracing::debug;

use crate::ports::SessionProvider;

#[derive(Debug, Default)]
struct Entry {
    cached: Option<(Session, Instant)>,
    /// Bumped by every `replace` and `clear`.
    generation: u64,
}

/// Caches the session read from a `SessionProvider` for `ttl`.
///
/// A refresh writes the new session straight into the cache, so requests
/// issued after it never see the stale token even while the store lags.
/// A store read that overlaps a `replace` or `clear` is discarded.
pub struct SessionCache {
    provider: Arc<dyn SessionProvider>,
    ttl: Duration,
    entry: Mutex<Entry>,
    fetching: tokio::sync::Mutex<()>,
}

impl SessionCache {
    /// Create a cache over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn SessionProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            entry: Mutex::new(Entry::default()),
            fetching: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the cached session, reading the store when the entry is
    /// missing or older than the TTL.
    ///
    /// Only one store read runs at a time; callers that queued behind it
    /// reuse its result.
    ///
    /// # Errors
    /// Propagates the store's error when it has to be read.
    pub async fn current(&self) -> Result<Option<Session>, AuthError> {
        if let Some(session) = self.fresh() {
            return Ok(Some(session));
        }

        let _fetching = self.fetching.lock().await;
        if let Some(session) = self.fresh() {
            return Ok(Some(session));
        }

        let generation = self.entry.lock().generation;
        debug!("Session cache miss, reading store");
        let fetched = self.provider.fetch().await?;

        let mut entry = self.entry.lock();
        if entry.generation != generation {
            debug!("Session changed during store read, keeping cached entry");
            return Ok(entry.cached.as_ref().map(|(session, _)| session.clone()));
        }
        entry.cached = fetched.clone().map(|session| (session, Instant::now()));
        Ok(fetched)
    }

    /// Stores `session` as the current entry.
    pub fn replace(&self, session: Session) {
        let mut entry = self.entry.lock();
        entry.cached = Some((session, Instant::now()));
        entry.generation = entry.generation.wrapping_add(1);
    }

    /// Drops the cached entry.
    pub fn clear(&self) {
        let mut entry = self.entry.lock();
        entry.cached = None;
        entry.generation = entry.generation.wrapping_add(1);
    }

    /// The underlying store.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn SessionProvider> {
        &self.provider
    }

    fn fresh(&self) -> Option<Session> {
        let entry = self.entry.lock();
        entry
            .cached
            .as_ref()
            .filter(|(_, cached_at)| cached_at.elapsed() < self.ttl)
            .map(|(session, _)| session.clone())
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("ttl", &self.ttl)
            .field("cached", &self.entry.lock().cached.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::Semaphore;

    struct CountingProvider {
        inner: MemorySessionStore,
        fetches: AtomicUsize,
        gate: Option<Semaphore>,
    }

    impl CountingProvider {
        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn open(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(Semaphore::MAX_PERMITS / 2);
            }
        }
    }

    #[async_trait]
    impl SessionProvider for CountingProvider {
        async fn fetch(&self) -> Result<Option<Session>, AuthError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let session = self.inner.fetch().await;
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            session
        }

        async fn update(&self, session: &Session) -> Result<(), AuthError> {
            self.inner.update(session).await
        }

        async fn clear(&self) -> Result<(), AuthError> {
            self.inner.clear().await
        }
    }

    fn counting() -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            inner: MemorySessionStore::new(),
            fetches: AtomicUsize::new(0),
            gate: None,
        })
    }

    fn gated() -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            inner: MemorySessionStore::new(),
            fetches: AtomicUsize::new(0),
            gate: Some(Semaphore::new(0)),
        })
    }

    async fn wait_for_fetches(provider: &CountingProvider, expected: usize) {
        for _ in 0..10_000 {
            if provider.fetches() == expected {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {expected} fetches, saw {}", provider.fetches());
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let provider = counting();
        provider.inner.set(Some(Session::new("tok1", None))).await;
        let cache = SessionCache::new(provider.clone(), Duration::from_secs(30));

        assert_eq!(cache.current().await.unwrap().unwrap().access_token, "tok1");
        assert_eq!(cache.current().await.unwrap().unwrap().access_token, "tok1");
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_reads_store() {
        let provider = counting();
        provider.inner.set(Some(Session::new("tok1", None))).await;
        let cache = SessionCache::new(provider.clone(), Duration::ZERO);

        cache.current().await.unwrap();
        cache.current().await.unwrap();
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replace_overrides_stale_store() {
        let provider = counting();
        provider.inner.set(Some(Session::new("tok1", None))).await;
        let cache = SessionCache::new(provider.clone(), Duration::from_secs(30));

        cache.replace(Session::new("tok2", None));

        assert_eq!(cache.current().await.unwrap().unwrap().access_token, "tok2");
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_signed_out_store_is_not_cached() {
        let provider = counting();
        let cache = SessionCache::new(provider.clone(), Duration::from_secs(30));

        assert!(cache.current().await.unwrap().is_none());
        assert!(cache.current().await.unwrap().is_none());
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replace_during_store_read_wins() {
        let provider = gated();
        provider.inner.set(Some(Session::new("tok1", None))).await;
        let cache = Arc::new(SessionCache::new(provider.clone(), Duration::from_secs(30)));

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.current().await })
        };
        wait_for_fetches(&provider, 1).await;
        cache.replace(Session::new("tok2", None));
        provider.open();

        let read = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(read.access_token, "tok2");
        assert_eq!(cache.current().await.unwrap().unwrap().access_token, "tok2");
        assert_eq!(provider.fetches(), 1);
    }

    #[tokio::test]
    async fn test_clear_during_store_read_wins() {
        let provider = gated();
        provider.inner.set(Some(Session::new("tok1", None))).await;
        let cache = Arc::new(SessionCache::new(provider.clone(), Duration::from_secs(30)));

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.current().await })
        };
        wait_for_fetches(&provider, 1).await;
        cache.clear();
        provider.open();

        assert!(reader.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cold_cache_reads_store_once() {
        let provider = gated();
        provider.inner.set(Some(Session::new("tok1", None))).await;
        let cache = Arc::new(SessionCache::new(provider.clone(), Duration::from_secs(30)));

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.current().await })
            })
            .collect();
        wait_for_fetches(&provider, 1).await;
        provider.open();

        for reader in readers {
            assert_eq!(
                reader.await.unwrap().unwrap().unwrap().access_token,
                "tok1"
            );
        }
        assert_eq!(provider.fetches(), 1);
    }
}
