//! Query result cache with single-flight fetches
//!
//! One cache is shared by every adapter in the process. Entries are keyed by
//! (adapter, method, scope, query) and expire after a per-adapter TTL. Ready
//! results live in a moka cache, which owns expiry and eviction; fetches that
//! are still running are tracked separately in a `DashMap`.
//!
//! While a fetch for a key is running, later callers for the same key await
//! the running fetch instead of starting another one, and all of them observe
//! the same result or the same error. Failed fetches never leave anything in
//! the cache. Dropping a waiter does not affect the others; the fetch itself is
//! only dropped once nobody is waiting on it any more.

use crate::model::{Item, QueryMethod, QueryResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use moka::notification::RemovalCause;
use moka::Expiry;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Upper bound on ready entries before moka starts evicting
pub const DEFAULT_MAX_ENTRIES: u64 = 100_000;

/// Identity of a cached query result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source_name: String,
    pub method: QueryMethod,
    pub scope: String,
    pub query: String,
}

impl CacheKey {
    pub fn new(source_name: &str, method: QueryMethod, scope: &str, query: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            method,
            scope: scope.to_string(),
            query: query.to_string(),
        }
    }
}

type FetchFuture = BoxFuture<'static, QueryResult<Arc<Vec<Item>>>>;

#[derive(Clone)]
struct CachedItems {
    items: Arc<Vec<Item>>,
    ttl: Duration,
}

/// Each entry expires after the TTL it was stored with
struct PerEntryTtl;

impl Expiry<CacheKey, CachedItems> for PerEntryTtl {
    fn expire_after_create(&self, _key: &CacheKey, value: &CachedItems, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CachedItems,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

struct InFlight {
    generation: u64,
    fetch: WeakShared<FetchFuture>,
}

#[derive(Default)]
struct AtomicCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    joins: AtomicU64,
    expirations: AtomicU64,
}

/// Counters for cache decisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Callers that joined a fetch already in flight
    pub joins: u64,
    /// Entries dropped by moka because their TTL ran out
    pub expirations: u64,
}

pub struct Cache {
    entries: moka::sync::Cache<CacheKey, CachedItems>,
    in_flight: DashMap<CacheKey, InFlight>,
    next_generation: AtomicU64,
    stats: Arc<AtomicCacheStats>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("entry_count", &self.entries.entry_count())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl Cache {
    pub fn new() -> Arc<Self> {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: u64) -> Arc<Self> {
        let stats = Arc::new(AtomicCacheStats::default());
        let eviction_stats = stats.clone();

        let entries = moka::sync::Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .support_invalidation_closures()
            .eviction_listener(move |_key, _value, cause| {
                if cause == RemovalCause::Expired {
                    eviction_stats.expirations.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build();

        Arc::new(Self {
            entries,
            in_flight: DashMap::new(),
            next_generation: AtomicU64::new(0),
            stats,
        })
    }

    /// Look up a live entry
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Item>>> {
        self.entries.get(key).map(|cached| cached.items)
    }

    /// Store a result. A zero TTL stores nothing.
    pub fn set(&self, key: CacheKey, items: Arc<Vec<Item>>, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        // A running fetch for this key still delivers to its waiters, but
        // must not overwrite the newer value when it completes.
        self.in_flight.remove(&key);
        self.entries.insert(key, CachedItems { items, ttl });
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.in_flight.remove(key);
        self.entries.invalidate(key);
    }

    /// Drop every entry belonging to one adapter
    pub fn invalidate_source(&self, source_name: &str) {
        self.in_flight.retain(|key, _| key.source_name != source_name);

        let owned = source_name.to_string();
        if let Err(err) = self
            .entries
            .invalidate_entries_if(move |key, _| key.source_name == owned)
        {
            tracing::warn!("falling back to a full scan to invalidate {}: {}", source_name, err);
            for (key, _) in self.entries.iter() {
                if key.source_name == source_name {
                    self.entries.invalidate(key.as_ref());
                }
            }
        }
    }

    pub fn clear(&self) {
        self.in_flight.clear();
        self.entries.invalidate_all();
    }

    /// Number of ready entries, after moka has applied pending expiry and
    /// invalidation work
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Number of fetches currently running
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            joins: self.stats.joins.load(Ordering::Relaxed),
            expirations: self.stats.expirations.load(Ordering::Relaxed),
        }
    }

    fn record_hit(&self, key: &CacheKey) {
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "cache hit: {} {} {:?} in {}",
            key.method,
            key.source_name,
            key.query,
            key.scope
        );
    }

    /// Return the cached value for `key`, or run `fetch` exactly once across
    /// all concurrent callers and cache its successful result for `ttl`.
    ///
    /// With `ignore_cache` a live entry is bypassed, but an in-flight fetch is
    /// still joined since its result is fresh.
    pub async fn get_or_fetch<F, Fut>(
        self: &Arc<Self>,
        key: CacheKey,
        ttl: Duration,
        ignore_cache: bool,
        fetch: F,
    ) -> QueryResult<Arc<Vec<Item>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = QueryResult<Vec<Item>>> + Send + 'static,
    {
        if !ignore_cache {
            if let Some(items) = self.get(&key) {
                self.record_hit(&key);
                return Ok(items);
            }
        }

        let shared = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(mut occupied) => match occupied.get().fetch.upgrade() {
                Some(running) => {
                    self.stats.joins.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        "joining in-flight fetch: {} {} {:?} in {}",
                        key.method,
                        key.source_name,
                        key.query,
                        key.scope
                    );
                    running
                },
                None => {
                    // Every waiter of the previous fetch went away
                    let (leader, in_flight) = self.start_fetch(key, ttl, fetch());
                    if let Some(in_flight) = in_flight {
                        occupied.insert(in_flight);
                    }
                    leader
                },
            },
            Entry::Vacant(vacant) => {
                // A leader may have completed between the lookup above and
                // taking the entry
                if !ignore_cache {
                    if let Some(items) = self.get(&key) {
                        self.record_hit(&key);
                        return Ok(items);
                    }
                }
                let (leader, in_flight) = self.start_fetch(key, ttl, fetch());
                if let Some(in_flight) = in_flight {
                    vacant.insert(in_flight);
                }
                leader
            },
        };

        shared.await
    }

    fn start_fetch<Fut>(self: &Arc<Self>, key: CacheKey, ttl: Duration, fetch: Fut) -> (Shared<FetchFuture>, Option<InFlight>)
    where
        Fut: Future<Output = QueryResult<Vec<Item>>> + Send + 'static,
    {
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let guard = InFlightGuard {
            cache: Arc::downgrade(self),
            key,
            generation,
            finished: false,
        };
        let leader = async move {
            let result = fetch.await.map(Arc::new);
            guard.finish(&result, ttl);
            result
        }
        .boxed()
        .shared();

        let in_flight = leader.downgrade().map(|fetch| InFlight { generation, fetch });
        (leader, in_flight)
    }

    fn complete(&self, key: &CacheKey, generation: u64, result: &QueryResult<Arc<Vec<Item>>>, ttl: Duration) {
        // The store happens under the entry lock so a concurrent invalidate
        // either runs before (and we skip) or after (and removes it)
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) if occupied.get().generation == generation => {
                if let Ok(items) = result {
                    if !ttl.is_zero() {
                        self.entries.insert(
                            key.clone(),
                            CachedItems {
                                items: items.clone(),
                                ttl,
                            },
                        );
                    }
                }
                occupied.remove();
            },
            // Invalidated or overwritten while running; leave the newer state alone
            _ => {},
        }
    }

    fn abandon(&self, key: &CacheKey, generation: u64) {
        tracing::debug!("fetch abandoned by every waiter: {} {} {:?}", key.method, key.source_name, key.query);
        self.in_flight
            .remove_if(key, |_, in_flight| in_flight.generation == generation);
    }
}

/// Removes the in-flight marker when the fetch is dropped before finishing
struct InFlightGuard {
    cache: Weak<Cache>,
    key: CacheKey,
    generation: u64,
    finished: bool,
}

impl InFlightGuard {
    fn finish(mut self, result: &QueryResult<Arc<Vec<Item>>>, ttl: Duration) {
        self.finished = true;
        if let Some(cache) = self.cache.upgrade() {
            cache.complete(&self.key, self.generation, result, ttl);
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(cache) = self.cache.upgrade() {
            cache.abandon(&self.key, self.generation);
        }
    }
}
