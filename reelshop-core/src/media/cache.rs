//! Process-wide media cache keyed by URL.
//!
//! A URL is fetched at most once at a time. Concurrent requests for a URL
//! that is still loading all await the same shared future, and completed
//! loads are answered from memory. The fetch itself runs on its own task so
//! a requester that stops waiting never aborts it: the result still lands in
//! the cache for the next caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reelshop_model::MediaItem;

use super::fetcher::MediaFetcher;
use super::handle::MediaHandle;
use crate::error::MediaError;

type SharedLoad = Shared<BoxFuture<'static, Option<MediaHandle>>>;

enum CacheSlot {
    /// `generation` identifies the fetch that owns this slot.
    Loading { generation: u64, load: SharedLoad },
    Loaded(MediaHandle),
    Failed { error: MediaError, at: Instant },
}

/// Externally visible state of a URL in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    Absent,
    Loading,
    Loaded,
    Failed(MediaError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub loaded: usize,
    pub loading: usize,
    pub failed: usize,
    pub fetches_started: u64,
    pub hits: u64,
    pub joined: u64,
    pub loaded_bytes: u64,
}

#[derive(Default)]
struct Counters {
    fetches_started: AtomicU64,
    hits: AtomicU64,
    joined: AtomicU64,
}

struct CacheInner {
    fetcher: Arc<dyn MediaFetcher>,
    entries: DashMap<String, CacheSlot>,
    counters: Counters,
}

/// Shared, clonable media cache.
#[derive(Clone)]
pub struct MediaCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for MediaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCache")
            .field("fetcher", &self.inner.fetcher)
            .field("entries", &self.inner.entries.len())
            .finish()
    }
}

impl MediaCache {
    pub fn new(fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                fetcher,
                entries: DashMap::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Resolve `item`, fetching it if needed.
    ///
    /// Returns `None` when the load failed or the URL is empty. A URL whose
    /// last attempt failed is fetched again. Must be called from within a
    /// Tokio runtime.
    pub async fn preload(&self, item: &MediaItem) -> Option<MediaHandle> {
        let url = item.url();
        if url.is_empty() {
            return None;
        }

        let pending = match self.inner.entries.entry(url.to_string()) {
            Entry::Occupied(mut occupied) => {
                let existing = match occupied.get() {
                    CacheSlot::Loaded(handle) => Some(Ok(handle.clone())),
                    CacheSlot::Loading { load, .. } => Some(Err(load.clone())),
                    CacheSlot::Failed { .. } => None,
                };
                match existing {
                    Some(Ok(handle)) => {
                        self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                        return Some(handle);
                    }
                    Some(Err(shared)) => {
                        self.inner.counters.joined.fetch_add(1, Ordering::Relaxed);
                        log::trace!("[MediaCache] joining in-flight load for {}", url);
                        shared
                    }
                    None => {
                        log::debug!("[MediaCache] retrying failed url {}", url);
                        let (generation, load) = self.spawn_fetch(item.clone());
                        occupied.insert(CacheSlot::Loading {
                            generation,
                            load: load.clone(),
                        });
                        load
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let (generation, load) = self.spawn_fetch(item.clone());
                vacant.insert(CacheSlot::Loading {
                    generation,
                    load: load.clone(),
                });
                load
            }
        };

        pending.await
    }

    /// Resolve every item concurrently, preserving input order.
    pub async fn preload_all(&self, items: &[MediaItem]) -> Vec<Option<MediaHandle>> {
        futures::future::join_all(items.iter().map(|item| self.preload(item))).await
    }

    /// Start a fetch for `item` on its own task.
    ///
    /// Called with the entry guard held, so the returned generation is in the
    /// slot before the task can look for it.
    fn spawn_fetch(&self, item: MediaItem) -> (u64, SharedLoad) {
        let generation = self
            .inner
            .counters
            .fetches_started
            .fetch_add(1, Ordering::Relaxed)
            + 1;

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let url = item.url().to_string();
            let result = inner.fetcher.fetch(&item).await;

            // After a clear() the slot is gone or owned by a newer fetch.
            let slot = inner.entries.get_mut(&url).filter(|slot| {
                matches!(
                    slot.value(),
                    CacheSlot::Loading { generation: owner, .. } if *owner == generation
                )
            });
            let Some(mut slot) = slot else {
                log::trace!("[MediaCache] {} was evicted while loading", url);
                return result.ok().map(MediaHandle::new);
            };

            match result {
                Ok(payload) => {
                    let handle = MediaHandle::new(payload);
                    log::debug!(
                        "[MediaCache] loaded {} ({} bytes)",
                        url,
                        handle.len()
                    );
                    *slot = CacheSlot::Loaded(handle.clone());
                    Some(handle)
                }
                Err(error) => {
                    log::warn!("[MediaCache] failed to load {}: {}", url, error);
                    *slot = CacheSlot::Failed {
                        error,
                        at: Instant::now(),
                    };
                    None
                }
            }
        });

        let load = async move {
            match task.await {
                Ok(handle) => handle,
                Err(err) => {
                    log::error!("[MediaCache] fetch task ended abnormally: {}", err);
                    None
                }
            }
        }
        .boxed()
        .shared();

        (generation, load)
    }

    pub fn is_cached(&self, url: &str) -> bool {
        matches!(
            self.inner.entries.get(url).as_deref(),
            Some(CacheSlot::Loaded(_))
        )
    }

    /// Loaded handle for `url`, without starting a fetch.
    pub fn get_cached(&self, url: &str) -> Option<MediaHandle> {
        match self.inner.entries.get(url).as_deref() {
            Some(CacheSlot::Loaded(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn state(&self, url: &str) -> CacheState {
        match self.inner.entries.get(url).as_deref() {
            None => CacheState::Absent,
            Some(CacheSlot::Loading { .. }) => CacheState::Loading,
            Some(CacheSlot::Loaded(_)) => CacheState::Loaded,
            Some(CacheSlot::Failed { error, .. }) => CacheState::Failed(error.clone()),
        }
    }

    /// When the last attempt for `url` failed, if it did.
    pub fn failed_at(&self, url: &str) -> Option<Instant> {
        match self.inner.entries.get(url).as_deref() {
            Some(CacheSlot::Failed { at, .. }) => Some(*at),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            fetches_started: self.inner.counters.fetches_started.load(Ordering::Relaxed),
            hits: self.inner.counters.hits.load(Ordering::Relaxed),
            joined: self.inner.counters.joined.load(Ordering::Relaxed),
            ..CacheStats::default()
        };

        for entry in self.inner.entries.iter() {
            stats.entries += 1;
            match entry.value() {
                CacheSlot::Loading { .. } => stats.loading += 1,
                CacheSlot::Loaded(handle) => {
                    stats.loaded += 1;
                    stats.loaded_bytes += handle.len() as u64;
                }
                CacheSlot::Failed { .. } => stats.failed += 1,
            }
        }

        stats
    }

    /// Drop every entry. Loads still in flight complete for their waiters
    /// but are not stored.
    pub fn clear(&self) {
        self.inner.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFetcher;
    use std::time::Duration;

    fn cache_with(fetcher: &ScriptedFetcher) -> MediaCache {
        MediaCache::new(Arc::new(fetcher.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_share_one_fetch() {
        let fetcher = ScriptedFetcher::new().with_latency(Duration::from_millis(40));
        let cache = cache_with(&fetcher);
        let item = MediaItem::image("https://cdn.test/a.jpg");

        let (a, b, c) = tokio::join!(
            cache.preload(&item),
            cache.preload(&item),
            cache.preload(&item)
        );

        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(MediaHandle::ptr_eq(&a, &b));
        assert!(MediaHandle::ptr_eq(&b, &c));
        assert_eq!(fetcher.call_count("https://cdn.test/a.jpg"), 1);
        assert_eq!(cache.stats().joined, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn loaded_urls_are_served_from_memory() {
        let fetcher = ScriptedFetcher::new();
        let cache = cache_with(&fetcher);
        let item = MediaItem::image("https://cdn.test/b.jpg");

        let first = cache.preload(&item).await.unwrap();
        assert!(cache.is_cached(item.url()));

        let second = cache.preload(&item).await.unwrap();
        assert!(MediaHandle::ptr_eq(&first, &second));
        assert_eq!(fetcher.call_count(item.url()), 1);
        assert_eq!(cache.stats().hits, 1);
        assert!(cache.get_cached(item.url()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_recorded_and_retried_on_next_request() {
        let fetcher = ScriptedFetcher::new();
        let url = "https://cdn.test/broken.jpg";
        fetcher.fail(url);
        let cache = cache_with(&fetcher);
        let item = MediaItem::image(url);

        assert!(cache.preload(&item).await.is_none());
        assert!(matches!(cache.state(url), CacheState::Failed(_)));
        assert!(cache.failed_at(url).is_some());
        assert!(!cache.is_cached(url));

        fetcher.reset();
        fetcher.recover(url);
        assert!(cache.preload(&item).await.is_some());
        assert_eq!(cache.state(url), CacheState::Loaded);
        assert_eq!(fetcher.calls(), vec![url.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_waiters_do_not_cancel_the_fetch() {
        let fetcher = ScriptedFetcher::new().with_latency(Duration::from_millis(100));
        let cache = cache_with(&fetcher);
        let item = MediaItem::image("https://cdn.test/slow.jpg");

        let waited = tokio::time::timeout(Duration::from_millis(10), cache.preload(&item)).await;
        assert!(waited.is_err());
        assert_eq!(cache.state(item.url()), CacheState::Loading);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.is_cached(item.url()));
        assert_eq!(fetcher.call_count(item.url()), 1);
    }

    #[tokio::test]
    async fn empty_urls_resolve_to_nothing() {
        let fetcher = ScriptedFetcher::new();
        let cache = cache_with(&fetcher);

        assert!(cache.preload(&MediaItem::image("")).await.is_none());
        assert!(cache.is_empty());
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_while_loading_skips_storing_the_result() {
        let fetcher = ScriptedFetcher::new().with_latency(Duration::from_millis(30));
        let cache = cache_with(&fetcher);
        let item = MediaItem::image("https://cdn.test/c.jpg");

        let waiter = {
            let cache = cache.clone();
            let item = item.clone();
            tokio::spawn(async move { cache.preload(&item).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.state(item.url()), CacheState::Loading);
        cache.clear();

        assert!(waiter.await.unwrap().is_some());
        assert_eq!(cache.state(item.url()), CacheState::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fetch_does_not_overwrite_a_newer_load() {
        let url = "https://cdn.test/d.jpg";
        let fetcher = ScriptedFetcher::new().expect_calls(2);
        fetcher.fail(url);
        fetcher.set_latency(url, Duration::from_millis(100));
        let cache = cache_with(&fetcher);
        let item = MediaItem::image(url);

        let stale = {
            let cache = cache.clone();
            let item = item.clone();
            tokio::spawn(async move { cache.preload(&item).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.clear();
        fetcher.recover(url);
        fetcher.set_latency(url, Duration::from_millis(200));

        let fresh = {
            let cache = cache.clone();
            let item = item.clone();
            tokio::spawn(async move { cache.preload(&item).await })
        };
        tokio::time::sleep(Duration::from_millis(140)).await;

        // The first fetch has failed by now; the second is still running.
        assert!(stale.await.unwrap().is_none());
        assert_eq!(cache.state(url), CacheState::Loading);
        assert_eq!(fetcher.total_calls(), 2);

        let joined = cache.preload(&item).await;
        assert!(joined.is_some());
        assert!(fresh.await.unwrap().is_some());
        assert_eq!(cache.state(url), CacheState::Loaded);
        assert_eq!(cache.stats().joined, 1);
        fetcher.verify().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn preload_all_keeps_order() {
        let fetcher = ScriptedFetcher::new();
        let cache = cache_with(&fetcher);
        let items = vec![
            MediaItem::video("https://cdn.test/v.mp4"),
            MediaItem::image("https://cdn.test/1.jpg"),
        ];

        let handles = cache.preload_all(&items).await;
        assert_eq!(handles[0].as_ref().unwrap().url(), "https://cdn.test/v.mp4");
        assert_eq!(handles[1].as_ref().unwrap().url(), "https://cdn.test/1.jpg");
        assert_eq!(cache.stats().loaded, 2);
    }
}
