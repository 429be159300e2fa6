//! Query Cache
//!
//! Keyed, JSON-backed cache for server state. A cached value is served while
//! it is fresh (`stale_time`; `None` never goes stale); otherwise the fetch
//! closure runs, with `retry` extra attempts and exponential backoff between
//! them. Errors are never cached.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);
const DEFAULT_RETRY: u32 = 1;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Per-query freshness and retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// `None` means fresh forever
    pub stale_time: Option<Duration>,
    /// Extra attempts after the first failure
    pub retry: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Some(DEFAULT_STALE_TIME),
            retry: DEFAULT_RETRY,
        }
    }
}

impl QueryOptions {
    /// Session status: fetched once, never refetched or retried
    pub fn auth_status() -> Self {
        Self {
            stale_time: None,
            retry: 0,
        }
    }
}

struct Entry {
    value: Value,
    fetched_at: Instant,
    stale_time: Option<Duration>,
}

impl Entry {
    fn is_fresh(&self) -> bool {
        match self.stale_time {
            None => true,
            Some(stale) => self.fetched_at.elapsed() < stale,
        }
    }
}

#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(segments: &[&str]) -> String {
        segments.join("/")
    }

    /// Fresh cached value for `key`, or the result of `fetch`
    pub async fn fetch<T, E, F, Fut>(
        &self,
        key: &[&str],
        options: QueryOptions,
        mut fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cache_key = Self::key(key);
        if let Some(value) = self.get::<T>(key) {
            tracing::debug!(key = %cache_key, "Query cache hit");
            return Ok(value);
        }

        let mut attempt = 0;
        loop {
            match fetch().await {
                Ok(value) => {
                    self.store(&cache_key, &value, options.stale_time);
                    return Ok(value);
                }
                Err(e) if attempt < options.retry => {
                    let delay = retry_delay(attempt);
                    tracing::warn!(key = %cache_key, attempt, error = %e, ?delay, "Query failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(key = %cache_key, error = %e, "Query failed");
                    return Err(e);
                }
            }
        }
    }

    /// Fresh cached value, if any
    pub fn get<T: DeserializeOwned>(&self, key: &[&str]) -> Option<T> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(&Self::key(key)).filter(|e| e.is_fresh())?;
        serde_json::from_value(entry.value.clone()).ok()
    }

    pub fn set<T: Serialize>(&self, key: &[&str], value: &T, options: QueryOptions) {
        self.store(&Self::key(key), value, options.stale_time);
    }

    pub fn invalidate(&self, key: &[&str]) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&Self::key(key));
    }

    /// Drop every cached query
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(queries = entries.len(), "Clearing query cache");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store<T: Serialize>(&self, key: &str, value: &T, stale_time: Option<Duration>) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(
                        key.to_string(),
                        Entry {
                            value,
                            fetched_at: Instant::now(),
                            stale_time,
                        },
                    );
            }
            Err(e) => tracing::warn!(key, error = %e, "Query result not cacheable"),
        }
    }
}

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(1)
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_infinite_stale_time_fetches_once() {
        let cache = QueryCache::new();
        let calls = &AtomicU32::new(0);
        for _ in 0..3 {
            let value: Result<u32, String> = cache
                .fetch(&["auth", "status"], QueryOptions::auth_status(), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_and_errors_not_cached() {
        let cache = QueryCache::new();
        let calls = &AtomicU32::new(0);
        let result: Result<u32, String> = cache
            .fetch(&["auth", "status"], QueryOptions::auth_status(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_options_retry_once() {
        let cache = QueryCache::new();
        let calls = &AtomicU32::new(0);
        let result: Result<u32, String> = cache
            .fetch(&["user"], QueryOptions::default(), move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("flaky".to_string())
                } else {
                    Ok(1)
                }
            })
            .await;
        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_refetches() {
        let cache = QueryCache::new();
        let options = QueryOptions {
            stale_time: Some(Duration::from_secs(10)),
            retry: 0,
        };
        cache.set(&["user"], &1u32, options);
        assert_eq!(cache.get::<u32>(&["user"]), Some(1));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get::<u32>(&["user"]), None);
    }

    #[test]
    fn test_clear() {
        let cache = QueryCache::new();
        cache.set(&["a"], &1u32, QueryOptions::default());
        cache.set(&["b"], &2u32, QueryOptions::default());
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_retry_delay_caps() {
        assert_eq!(retry_delay(0), Duration::from_secs(1));
        assert_eq!(retry_delay(2), Duration::from_secs(4));
        assert_eq!(retry_delay(10), MAX_RETRY_DELAY);
    }
}
