//! Time-bounded cache of parsed router configurations.
//!
//! Parsing a full dump is cheap compared to fetching it over SSH, so the
//! cache stores both the raw text and its [`ParsedConfig`]. Entries expire
//! after the configured TTL. After writing to a router, callers either
//! [`invalidate`](ConfigCache::invalidate) the entry or
//! [`mark_dirty`](ConfigCache::mark_dirty) it so the next read refetches.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::debug;
use moka::future::Cache;

use crate::config::ManagerConfig;
use crate::error::ConnectError;
use crate::parser::{ParsedConfig, WrapConfig};
use crate::source::ConfigSource;

const MAX_ROUTERS: u64 = 256;

/// One cached dump.
#[derive(Debug)]
pub struct CachedConfig {
    raw: String,
    parsed: Arc<ParsedConfig>,
    fetched_at: Instant,
}

impl CachedConfig {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn parsed(&self) -> &Arc<ParsedConfig> {
        &self.parsed
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Parsed configurations keyed by [`ConfigSource::key`].
#[derive(Clone)]
pub struct ConfigCache {
    cache: Cache<String, Arc<CachedConfig>>,
    dirty: Arc<Mutex<HashSet<String>>>,
    wrap: WrapConfig,
}

impl ConfigCache {
    pub fn new(ttl: Duration, wrap: WrapConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ROUTERS)
            .time_to_live(ttl)
            .build();
        Self {
            cache,
            dirty: Arc::new(Mutex::new(HashSet::new())),
            wrap,
        }
    }

    pub fn from_config(config: &ManagerConfig) -> Self {
        Self::new(
            Duration::from_secs(config.cache_ttl_secs),
            config.wrap.clone(),
        )
    }

    fn dirty(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.dirty.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached entry for `key`, unless it expired or was marked dirty.
    pub async fn get(&self, key: &str) -> Option<Arc<CachedConfig>> {
        if self.is_dirty(key) {
            return None;
        }
        self.cache.get(key).await
    }

    /// Returns the cached entry or fetches, parses and caches a new one.
    pub async fn get_or_fetch<S: ConfigSource>(
        &self,
        source: &S,
    ) -> Result<Arc<CachedConfig>, ConnectError> {
        if let Some(entry) = self.get(source.key()).await {
            debug!("Cache hit: {}", source.key());
            return Ok(entry);
        }
        debug!("Cache miss, fetching configuration for {}...", source.key());
        let (entry, _) = self.refresh(source).await?;
        Ok(entry)
    }

    /// Fetches unconditionally. The flag is true when the new dump differs
    /// from the one it replaced, or when there was none.
    pub async fn refresh<S: ConfigSource>(
        &self,
        source: &S,
    ) -> Result<(Arc<CachedConfig>, bool), ConnectError> {
        let raw = source.fetch().await?;
        let previous = self.cache.get(source.key()).await;
        let entry = self.insert(source.key(), raw).await;
        let changed = match previous {
            Some(previous) => previous.parsed.fingerprint() != entry.parsed.fingerprint(),
            None => true,
        };
        debug!(
            "{} configuration {} ({})",
            source.key(),
            if changed { "changed" } else { "unchanged" },
            entry.parsed.fingerprint_hex()
        );
        Ok((entry, changed))
    }

    /// Parses `raw` and stores it as the clean entry for `key`.
    pub async fn insert(&self, key: &str, raw: String) -> Arc<CachedConfig> {
        let parsed = Arc::new(ParsedConfig::parse(&raw, &self.wrap));
        let entry = Arc::new(CachedConfig {
            raw,
            parsed,
            fetched_at: Instant::now(),
        });
        self.cache.insert(key.to_string(), entry.clone()).await;
        self.dirty().remove(key);
        entry
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
        self.dirty().remove(key);
    }

    /// Makes the next [`get_or_fetch`](Self::get_or_fetch) refetch `key`.
    pub fn mark_dirty(&self, key: &str) {
        debug!("{} configuration marked dirty", key);
        self.dirty().insert(key.to_string());
    }

    pub fn is_dirty(&self, key: &str) -> bool {
        self.dirty().contains(key)
    }

    /// Approximate number of cached routers.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigCache;
    use crate::error::ConnectError;
    use crate::parser::{ContextKind, ScopeId, WrapConfig};
    use crate::source::ConfigSource;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting {
        text: Mutex<String>,
        fetches: AtomicUsize,
    }

    impl Counting {
        fn new(text: &str) -> Self {
            Self {
                text: Mutex::new(text.to_string()),
                fetches: AtomicUsize::new(0),
            }
        }

        fn set(&self, text: &str) {
            *self.text.lock().expect("text lock") = text.to_string();
        }
    }

    impl ConfigSource for Counting {
        fn key(&self) -> &str {
            "rtx1"
        }

        async fn fetch(&self) -> Result<String, ConnectError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.lock().expect("text lock").clone())
        }
    }

    const DUMP: &str = "ip filter 10 pass * *\ntunnel select 1\n tunnel encapsulation ipsec\ntunnel enable 1\n";

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = ConfigCache::new(Duration::from_secs(60), WrapConfig::default());
        let source = Counting::new(DUMP);

        let first = cache.get_or_fetch(&source).await.expect("fetch");
        let second = cache.get_or_fetch(&source).await.expect("cached");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.raw(), DUMP);
        assert!(
            second
                .parsed()
                .scoped(ContextKind::Tunnel, ScopeId::Number(1))
                .is_some()
        );
    }

    #[tokio::test]
    async fn dirty_entry_is_refetched() {
        let cache = ConfigCache::new(Duration::from_secs(60), WrapConfig::default());
        let source = Counting::new(DUMP);
        cache.get_or_fetch(&source).await.expect("fetch");

        cache.mark_dirty("rtx1");
        assert!(cache.is_dirty("rtx1"));
        assert!(cache.get("rtx1").await.is_none());

        cache.get_or_fetch(&source).await.expect("refetch");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert!(!cache.is_dirty("rtx1"));
    }

    #[tokio::test]
    async fn invalidate_drops_entry() {
        let cache = ConfigCache::new(Duration::from_secs(60), WrapConfig::default());
        let source = Counting::new(DUMP);
        cache.get_or_fetch(&source).await.expect("fetch");
        cache.invalidate("rtx1").await;
        assert!(cache.get("rtx1").await.is_none());
        cache.get_or_fetch(&source).await.expect("refetch");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_reports_fingerprint_changes() {
        let cache = ConfigCache::new(Duration::from_secs(60), WrapConfig::default());
        let source = Counting::new(DUMP);

        let (_, changed) = cache.refresh(&source).await.expect("first");
        assert!(changed);
        let (_, changed) = cache.refresh(&source).await.expect("same text");
        assert!(!changed);

        source.set("ip filter 11 reject * *\n");
        let (entry, changed) = cache.refresh(&source).await.expect("new text");
        assert!(changed);
        assert_eq!(entry.raw(), "ip filter 11 reject * *\n");
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = ConfigCache::new(Duration::from_millis(50), WrapConfig::default());
        let source = Counting::new(DUMP);
        cache.get_or_fetch(&source).await.expect("fetch");
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get("rtx1").await.is_none());
    }
}
