//! Revalidating cache for remote content
//!
//! Every listing and file read is remembered per path together with the time
//! it was fetched. Within the revalidation window the remembered value is
//! returned without touching the inner store; once the window has passed the
//! next request fetches again and replaces the entry. "Not found" answers are
//! cached like any other value, errors never are. Expired entries are swept
//! out at most once per window, so paths that are never requested again do
//! not pile up.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::github::{ContentStore, DirEntry, FetchError, RemoteFile};

/// A value and the moment it was fetched
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

/// [`ContentStore`] wrapper with time-based revalidation
pub struct RevalidatingStore<S> {
    inner: S,
    window: Duration,
    listings: DashMap<String, CacheEntry<Option<Vec<DirEntry>>>>,
    files: DashMap<String, CacheEntry<Option<RemoteFile>>>,
    last_sweep: Mutex<Instant>,
}

impl<S: ContentStore> RevalidatingStore<S> {
    pub fn new(inner: S, window: Duration) -> Self {
        Self {
            inner,
            window,
            listings: DashMap::new(),
            files: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn is_fresh(&self, fetched_at: Instant) -> bool {
        !self.window.is_zero() && fetched_at.elapsed() < self.window
    }

    /// Drop every entry older than the window, returning how many went
    pub fn purge_expired(&self) -> usize {
        let before = self.len();
        let window = self.window;
        self.listings.retain(|_, e| e.fetched_at.elapsed() < window);
        self.files.retain(|_, e| e.fetched_at.elapsed() < window);
        before.saturating_sub(self.len())
    }

    fn sweep_if_due(&self) {
        let Ok(mut last) = self.last_sweep.lock() else {
            return;
        };
        if last.elapsed() < self.window {
            return;
        }
        *last = Instant::now();
        drop(last);

        let purged = self.purge_expired();
        if purged > 0 {
            tracing::debug!("Swept {} expired cache entries", purged);
        }
    }

    /// Drop cached data for one path (listing and file)
    pub fn invalidate(&self, path: &str) {
        let key = normalize(path);
        self.listings.remove(&key);
        self.files.remove(&key);
    }

    /// Drop everything
    pub fn clear(&self) {
        self.listings.clear();
        self.files.clear();
    }

    /// Number of cached paths, listings and files combined
    pub fn len(&self) -> usize {
        self.listings.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<S: ContentStore> ContentStore for RevalidatingStore<S> {
    async fn list_dir(&self, path: &str) -> Result<Option<Vec<DirEntry>>, FetchError> {
        let key = normalize(path);
        if let Some(entry) = self.listings.get(&key) {
            if self.is_fresh(entry.fetched_at) {
                tracing::trace!("cache hit: listing {}", key);
                return Ok(entry.value.clone());
            }
        }

        tracing::debug!("cache miss: listing {}", key);
        let value = self.inner.list_dir(path).await?;
        if !self.window.is_zero() {
            self.sweep_if_due();
            self.listings.insert(
                key,
                CacheEntry {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }
        Ok(value)
    }

    async fn read_file(&self, path: &str) -> Result<Option<RemoteFile>, FetchError> {
        let key = normalize(path);
        if let Some(entry) = self.files.get(&key) {
            if self.is_fresh(entry.fetched_at) {
                tracing::trace!("cache hit: file {}", key);
                return Ok(entry.value.clone());
            }
        }

        tracing::debug!("cache miss: file {}", key);
        let value = self.inner.read_file(path).await?;
        if !self.window.is_zero() {
            self.sweep_if_due();
            self.files.insert(
                key,
                CacheEntry {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }
        Ok(value)
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}
