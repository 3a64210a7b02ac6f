//! Shared poll timers, one per data class and portal side.
//!
//! When several mounted views subscribe to the same data, they must share a
//! single timer instead of each running their own loop. The registry keys
//! timers by `(FeedPurpose, UserType)`; the first registration spawns the
//! ticker, later ones only re-point the callback slot, and the last
//! unregistration tears the ticker down so a future registration starts
//! fresh.
//!
//! The callback slot is an indirection cell: every tick clones the current
//! contents and invokes that. Re-subscribing replaces the slot contents, so
//! a ticker never calls through a closure captured by an earlier, possibly
//! stale subscriber.

use adpulse_core::{FeedPurpose, UserType};
use futures_util::FutureExt;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// One poll cycle as a type-erased future.
pub type CycleFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Factory invoked on every tick to produce the cycle future.
pub type PollCallback = Arc<dyn Fn() -> CycleFuture + Send + Sync>;

/// Identity of one shared timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollKey {
    pub purpose: FeedPurpose,
    pub user_type: UserType,
}

impl PollKey {
    pub fn new(purpose: FeedPurpose, user_type: UserType) -> Self {
        Self { purpose, user_type }
    }
}

struct PollEntry {
    subscriber_count: usize,
    slot: Arc<Mutex<PollCallback>>,
    handle: JoinHandle<()>,
}

/// Process-wide registry of shared poll timers.
///
/// Instantiable so tests get isolated, resettable state; production code
/// normally shares one instance via [`PollerRegistry::global`].
#[derive(Default)]
pub struct PollerRegistry {
    entries: Mutex<HashMap<PollKey, PollEntry>>,
}

static GLOBAL_REGISTRY: Lazy<Arc<PollerRegistry>> =
    Lazy::new(|| Arc::new(PollerRegistry::new()));

impl PollerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The composition-root registry shared by the whole process.
    pub fn global() -> Arc<PollerRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Subscribe to a shared timer, creating it on first registration.
    ///
    /// The callback becomes the timer's current target, replacing the
    /// previous subscriber's. `period` only takes effect when this call
    /// creates the timer; later subscribers share the existing cadence.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(
        self: &Arc<Self>,
        key: PollKey,
        period: Duration,
        callback: PollCallback,
    ) -> PollerGuard {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match entries.get_mut(&key) {
            Some(entry) => {
                entry.subscriber_count += 1;
                *entry
                    .slot
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = callback;
                tracing::debug!(
                    purpose = %key.purpose,
                    user_type = %key.user_type,
                    subscribers = entry.subscriber_count,
                    "Joined existing poller"
                );
            }
            None => {
                let slot = Arc::new(Mutex::new(callback));
                let handle = spawn_ticker(key, period, Arc::clone(&slot));
                entries.insert(
                    key,
                    PollEntry {
                        subscriber_count: 1,
                        slot,
                        handle,
                    },
                );
                tracing::debug!(
                    purpose = %key.purpose,
                    user_type = %key.user_type,
                    period_ms = period.as_millis() as u64,
                    "Poller started"
                );
            }
        }

        PollerGuard {
            registry: Arc::clone(self),
            key,
            released: false,
        }
    }

    /// Drop one subscription. The count is clamped at zero: extra calls for
    /// a torn-down key (rapid mount/unmount races) are a no-op.
    pub fn unregister(&self, key: PollKey) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let Some(entry) = entries.get_mut(&key) else {
            return;
        };
        entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
        if entry.subscriber_count == 0 {
            if let Some(entry) = entries.remove(&key) {
                entry.handle.abort();
            }
            tracing::debug!(
                purpose = %key.purpose,
                user_type = %key.user_type,
                "Poller stopped"
            );
        }
    }

    /// Current subscriber count for a key (zero when torn down).
    pub fn subscriber_count(&self, key: PollKey) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
            .map(|entry| entry.subscriber_count)
            .unwrap_or(0)
    }

    /// Whether a timer for this key is currently running.
    pub fn is_active(&self, key: PollKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&key)
    }

    /// Number of live timers across all keys.
    pub fn active_pollers(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn spawn_ticker(key: PollKey, period: Duration, slot: Arc<Mutex<PollCallback>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick resolves immediately; subscribers run their own
        // immediate fetch on mount, so consume it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let callback = slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            let cycle = callback();
            // The ticker never awaits the cycle: a slow fetch must not delay
            // the next tick. Cycles write absolute state, so overlap is safe.
            tokio::spawn(async move {
                if AssertUnwindSafe(cycle).catch_unwind().await.is_err() {
                    tracing::error!(
                        purpose = %key.purpose,
                        user_type = %key.user_type,
                        "Poll cycle panicked; timer keeps running"
                    );
                }
            });
        }
    })
}

/// RAII subscription handle; dropping it unregisters.
pub struct PollerGuard {
    registry: Arc<PollerRegistry>,
    key: PollKey,
    released: bool,
}

impl PollerGuard {
    pub fn key(&self) -> PollKey {
        self.key
    }

    /// Unregister now instead of at drop time.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.unregister(self.key);
        }
    }
}

impl Drop for PollerGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn key() -> PollKey {
        PollKey::new(FeedPurpose::Notifications, UserType::Client)
    }

    fn counting_callback(counter: Arc<AtomicU32>) -> PollCallback {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::Relaxed);
            })
        })
    }

    /// Let every runnable task (ticker, spawned cycles) drain under the
    /// paused clock before asserting.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_subscribers_share_one_timer() {
        let registry = Arc::new(PollerRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));

        let g1 = registry.register(key(), Duration::from_secs(60), counting_callback(Arc::clone(&counter)));
        let g2 = registry.register(key(), Duration::from_secs(60), counting_callback(Arc::clone(&counter)));
        let g3 = registry.register(key(), Duration::from_secs(60), counting_callback(Arc::clone(&counter)));

        assert_eq!(registry.active_pollers(), 1);
        assert_eq!(registry.subscriber_count(key()), 3);

        drop(g1);
        drop(g2);
        assert!(registry.is_active(key()));
        assert_eq!(registry.subscriber_count(key()), 1);

        drop(g3);
        assert!(!registry.is_active(key()));
        assert_eq!(registry.subscriber_count(key()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_invokes_callback_each_period() {
        let registry = Arc::new(PollerRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));
        let _guard = registry.register(
            key(),
            Duration::from_secs(60),
            counting_callback(Arc::clone(&counter)),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::Relaxed), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_callback_wins() {
        let registry = Arc::new(PollerRegistry::new());
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let _g1 = registry.register(
            key(),
            Duration::from_secs(60),
            counting_callback(Arc::clone(&first)),
        );
        let _g2 = registry.register(
            key(),
            Duration::from_secs(60),
            counting_callback(Arc::clone(&second)),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(first.load(Ordering::Relaxed), 0);
        assert_eq!(second.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_teardown() {
        let registry = Arc::new(PollerRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));
        let guard = registry.register(
            key(),
            Duration::from_secs(60),
            counting_callback(Arc::clone(&counter)),
        );
        drop(guard);

        tokio::time::advance(Duration::from_secs(300)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregister_after_teardown_starts_fresh() {
        let registry = Arc::new(PollerRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));

        let guard = registry.register(
            key(),
            Duration::from_secs(60),
            counting_callback(Arc::clone(&counter)),
        );
        drop(guard);
        assert!(!registry.is_active(key()));

        let _guard = registry.register(
            key(),
            Duration::from_secs(60),
            counting_callback(Arc::clone(&counter)),
        );
        assert!(registry.is_active(key()));
        assert_eq!(registry.subscriber_count(key()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_unregister_clamps_at_zero() {
        let registry = Arc::new(PollerRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));
        let guard = registry.register(
            key(),
            Duration::from_secs(60),
            counting_callback(Arc::clone(&counter)),
        );

        // Double-unmount race: drop plus stray direct unregisters.
        drop(guard);
        registry.unregister(key());
        registry.unregister(key());

        assert_eq!(registry.subscriber_count(key()), 0);
        assert!(!registry.is_active(key()));

        // The key is still usable afterwards.
        let _guard = registry.register(
            key(),
            Duration::from_secs(60),
            counting_callback(counter),
        );
        assert_eq!(registry.subscriber_count(key()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_get_distinct_timers() {
        let registry = Arc::new(PollerRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));

        let _g1 = registry.register(
            PollKey::new(FeedPurpose::Notifications, UserType::Admin),
            Duration::from_secs(60),
            counting_callback(Arc::clone(&counter)),
        );
        let _g2 = registry.register(
            PollKey::new(FeedPurpose::Notifications, UserType::Client),
            Duration::from_secs(60),
            counting_callback(Arc::clone(&counter)),
        );
        let _g3 = registry.register(
            PollKey::new(FeedPurpose::Dashboard, UserType::Client),
            Duration::from_secs(10),
            counting_callback(counter),
        );

        assert_eq!(registry.active_pollers(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_cycle_keeps_timer_alive() {
        let registry = Arc::new(PollerRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));
        let counter_in = Arc::clone(&counter);

        let callback: PollCallback = Arc::new(move || {
            let counter = Arc::clone(&counter_in);
            Box::pin(async move {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                if n == 0 {
                    panic!("first cycle blows up");
                }
            })
        });
        let _guard = registry.register(key(), Duration::from_secs(60), callback);
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(counter.load(Ordering::Relaxed), 2);
        assert!(registry.is_active(key()));
    }
}
