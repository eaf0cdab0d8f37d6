//! Caller-side report cache with a time-to-live.
//!
//! The report builders are stateless; this wrapper is how a long-running
//! caller avoids rescanning the source tables on every request.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use flow_core::CacheConfig;
use tracing::debug;

use crate::report::AnalysisReport;

#[derive(Debug)]
struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
}

/// Thread-safe single-value cache.
#[derive(Debug, Clone)]
pub struct ReportCache<T = AnalysisReport> {
    inner: Arc<Mutex<Option<CacheEntry<T>>>>,
    ttl: Duration,
}

impl<T: Clone> ReportCache<T> {
    /// Create a cache holding values for `ttl`. A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Option<CacheEntry<T>>> {
        // A panic inside `refresh` cannot leave a half-written entry.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cached value if present and not expired.
    pub fn get(&self) -> Option<T> {
        let guard = self.lock();
        guard
            .as_ref()
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// Cached value, or the result of `refresh` stored for the next TTL.
    ///
    /// The lock is held while refreshing so overlapping callers wait for one
    /// computation instead of each running their own.
    pub fn get_or_refresh<F>(&self, refresh: F) -> T
    where
        F: FnOnce() -> T,
    {
        let mut guard = self.lock();
        let now = Instant::now();
        if let Some(entry) = guard.as_ref().filter(|e| now < e.expires_at) {
            debug!("Report cache hit");
            return entry.value.clone();
        }

        debug!("Report cache miss, refreshing");
        let value = refresh();
        if !self.ttl.is_zero() {
            *guard = Some(CacheEntry {
                value: value.clone(),
                expires_at: Instant::now() + self.ttl,
            });
        }
        value
    }

    /// Drop the cached value.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }
}

impl<T: Clone> Default for ReportCache<T> {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
