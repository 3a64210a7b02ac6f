//! Retrying fetch with cache fallback.
//!
//! One code path replaces the per-screen retry loops the portal UI used to
//! duplicate: bounded exponential backoff, write-through caching on
//! success, and a guaranteed value on exhaustion. `fetch_with_fallback`
//! never returns an error; background refresh must stay invisible to end
//! users.

use crate::cache::CacheStore;
use crate::config::RetryConfig;
use crate::error::{ClientError, RetryPolicy};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Bounded exponential backoff: `min(initial * 2^attempt, max)`.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    pub max_retries: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl RetrySchedule {
    pub fn from_config(retry: &RetryConfig) -> Self {
        Self {
            max_retries: retry.max_retries,
            initial: Duration::from_millis(retry.initial_backoff_ms),
            max: Duration::from_millis(retry.max_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial_ms = self.initial.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(initial_ms.saturating_mul(multiplier).min(max_ms))
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Per-call knobs for [`Fetcher::fetch_with_fallback`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub schedule: RetrySchedule,
    pub policy: RetryPolicy,
    /// Cache slot for write-through and fallback. `None` disables caching
    /// (the call still resolves to the empty default on exhaustion).
    pub cache_key: Option<String>,
}

impl FetchOptions {
    pub fn new(schedule: RetrySchedule, policy: RetryPolicy, cache_key: Option<String>) -> Self {
        Self {
            schedule,
            policy,
            cache_key,
        }
    }
}

/// Counters for fetch activity, snapshotted for diagnostics.
#[derive(Debug, Default)]
pub struct FetcherMetrics {
    /// Request attempts issued, including retries.
    pub attempts: AtomicU64,
    /// Attempts that were retries of a failed attempt.
    pub retries: AtomicU64,
    /// Calls that exhausted retries and fell back.
    pub fallbacks: AtomicU64,
    /// Fallbacks satisfied from cache rather than the empty default.
    pub cache_hits: AtomicU64,
}

impl FetcherMetrics {
    pub fn snapshot(&self) -> FetcherSnapshot {
        FetcherSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FetcherMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetcherSnapshot {
    pub attempts: u64,
    pub retries: u64,
    pub fallbacks: u64,
    pub cache_hits: u64,
}

/// Shared fetch executor bound to one cache store.
#[derive(Clone)]
pub struct Fetcher {
    cache: CacheStore,
    metrics: Arc<FetcherMetrics>,
}

impl Fetcher {
    pub fn new(cache: CacheStore) -> Self {
        Self {
            cache,
            metrics: Arc::new(FetcherMetrics::default()),
        }
    }

    pub fn metrics(&self) -> FetcherSnapshot {
        self.metrics.snapshot()
    }

    /// Run `request` with retries, resolving to a value in every case.
    ///
    /// Success writes through to the cache. A missing token skips both the
    /// retries and the cache: there is nothing to retry against, and stale
    /// data from an authenticated session must not leak into a tokenless
    /// one. Every other exhausted failure falls back to the last cached
    /// value, then to `empty_default`.
    pub async fn fetch_with_fallback<T, F, Fut>(
        &self,
        options: &FetchOptions,
        empty_default: T,
        request: F,
    ) -> T
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            self.metrics.attempts.fetch_add(1, Ordering::Relaxed);
            match request().await {
                Ok(value) => {
                    if let Some(key) = &options.cache_key {
                        self.cache.write(key, &value);
                    }
                    return value;
                }
                Err(ClientError::MissingToken { user_type }) => {
                    tracing::debug!(%user_type, "No bearer token, serving empty default");
                    return empty_default;
                }
                Err(err) => {
                    if err.is_retryable(options.policy) && attempt < options.schedule.max_retries {
                        let delay = options.schedule.delay_for(attempt);
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Fetch failed, retrying"
                        );
                        self.metrics.retries.fetch_add(1, Ordering::Relaxed);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    tracing::warn!(
                        attempts = attempt + 1,
                        error = %err,
                        "Fetch exhausted, serving cached value"
                    );
                    break;
                }
            }
        }

        self.metrics.fallbacks.fetch_add(1, Ordering::Relaxed);
        if let Some(key) = &options.cache_key {
            if let Some(cached) = self.cache.read::<T>(key) {
                self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                return cached;
            }
        }
        empty_default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpulse_core::UserType;
    use std::sync::atomic::AtomicU32;

    fn options(cache_key: Option<&str>, policy: RetryPolicy) -> FetchOptions {
        FetchOptions::new(
            RetrySchedule::default(),
            policy,
            cache_key.map(str::to_string),
        )
    }

    fn transport_error() -> ClientError {
        ClientError::Transport {
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_backoff_schedule_doubles_then_caps() {
        let schedule = RetrySchedule::default();
        assert_eq!(schedule.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(schedule.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(schedule.delay_for(2), Duration::from_millis(4_000));
        assert_eq!(schedule.delay_for(3), Duration::from_millis(8_000));
        assert_eq!(schedule.delay_for(4), Duration::from_millis(8_000));
        assert_eq!(schedule.delay_for(63), Duration::from_millis(8_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_writes_through_to_cache() {
        let fetcher = Fetcher::new(CacheStore::in_memory());
        let options = options(Some("cached_dashboard_client"), RetryPolicy::AllFailures);

        let value = fetcher
            .fetch_with_fallback(&options, 0u64, || async { Ok(9u64) })
            .await;

        assert_eq!(value, 9);
        let cached: Option<u64> = fetcher.cache.read("cached_dashboard_client");
        assert_eq!(cached, Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_serve_cached_value() {
        let fetcher = Fetcher::new(CacheStore::in_memory());
        fetcher.cache.write("cached_dashboard_client", &vec![1u64, 2]);
        let options = options(Some("cached_dashboard_client"), RetryPolicy::AllFailures);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = Arc::clone(&calls);
        let value: Vec<u64> = fetcher
            .fetch_with_fallback(&options, Vec::new(), move || {
                let calls = Arc::clone(&calls_in);
                async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Err(transport_error())
                }
            })
            .await;

        assert_eq!(value, vec![1, 2]);
        // Initial attempt plus max_retries.
        assert_eq!(calls.load(Ordering::Relaxed), 4);
        assert_eq!(fetcher.metrics().fallbacks, 1);
        assert_eq!(fetcher.metrics().cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_without_cache_serve_empty_default() {
        let fetcher = Fetcher::new(CacheStore::in_memory());
        let options = options(Some("cached_accounts_admin"), RetryPolicy::AllFailures);

        let value: Vec<u64> = fetcher
            .fetch_with_fallback(&options, Vec::new(), || async { Err(transport_error()) })
            .await;

        assert!(value.is_empty());
        assert_eq!(fetcher.metrics().cache_hits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_total_seven_seconds() {
        let fetcher = Fetcher::new(CacheStore::in_memory());
        let options = options(None, RetryPolicy::AllFailures);

        let started = tokio::time::Instant::now();
        let _: u64 = fetcher
            .fetch_with_fallback(&options, 0, || async { Err(transport_error()) })
            .await;

        // Delays of 1s, 2s and 4s between the four attempts.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_error_not_retried_under_transport_only() {
        let fetcher = Fetcher::new(CacheStore::in_memory());
        fetcher.cache.write("cached_notifications_admin", &vec![7u64]);
        let options = options(Some("cached_notifications_admin"), RetryPolicy::TransportOnly);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = Arc::clone(&calls);
        let value: Vec<u64> = fetcher
            .fetch_with_fallback(&options, Vec::new(), move || {
                let calls = Arc::clone(&calls_in);
                async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Err(ClientError::Status {
                        status: 403,
                        message: "forbidden".to_string(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(value, vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_token_skips_cache_and_retries() {
        let fetcher = Fetcher::new(CacheStore::in_memory());
        fetcher.cache.write("cached_notifications_client", &vec![7u64]);
        let options = options(Some("cached_notifications_client"), RetryPolicy::TransportOnly);

        let value: Vec<u64> = fetcher
            .fetch_with_fallback(&options, Vec::new(), || async {
                Err(ClientError::MissingToken {
                    user_type: UserType::Client,
                })
            })
            .await;

        assert!(value.is_empty());
        assert_eq!(fetcher.metrics().attempts, 1);
        assert_eq!(fetcher.metrics().fallbacks, 0);
    }
}
