//! Notification subscription facade.
//!
//! A `NotificationFeed` is what a mounted view binds to: subscribing joins
//! the shared poller and runs one immediate cycle; dropping the feed leaves
//! the poller to the remaining subscribers. Every failure path inside a
//! cycle resolves to a value, so consumers never see an error state - at
//! worst the snapshot goes stale.

use crate::cache::{cache_key, unread_count_cache_key, CacheStore};
use crate::config::ClientConfig;
use crate::diff::DiffEngine;
use crate::error::RetryPolicy;
use crate::fetcher::{FetchOptions, Fetcher, RetrySchedule};
use crate::notifier::{DesktopNotifier, PermissionStatus};
use crate::poller::{PollCallback, PollKey, PollerGuard, PollerRegistry};
use crate::rest::NotificationSource;
use adpulse_core::{FeedPurpose, Notification, NotificationId, UserType};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Point-in-time feed state handed to consumers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

struct FeedInner {
    user_type: UserType,
    source: Arc<dyn NotificationSource>,
    notifier: Arc<dyn DesktopNotifier>,
    fetcher: Fetcher,
    list_options: FetchOptions,
    count_options: FetchOptions,
    state: Mutex<FeedSnapshot>,
    diff: Mutex<DiffEngine>,
    watch_tx: watch::Sender<FeedSnapshot>,
    /// Set when the owning feed handle drops; an in-flight cycle checks it
    /// before applying state so a dead subscriber cannot write.
    closed: AtomicBool,
}

impl FeedInner {
    /// One fetch->diff->deliver cycle. List and count are fetched
    /// concurrently; the diff engine runs once both have resolved. Cycles
    /// only write absolute state, so an overlapping slow cycle is safe.
    async fn run_cycle(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let user_type = self.user_type;

        let list_source = Arc::clone(&self.source);
        let count_source = Arc::clone(&self.source);
        let (list, count) = tokio::join!(
            self.fetcher
                .fetch_with_fallback(&self.list_options, Vec::new(), || {
                    let source = Arc::clone(&list_source);
                    async move { source.list_notifications(user_type).await }
                }),
            self.fetcher
                .fetch_with_fallback(&self.count_options, 0u64, || {
                    let source = Arc::clone(&count_source);
                    async move { source.unread_count(user_type).await }
                }),
        );

        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let deliveries = self
            .diff
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .diff(Utc::now(), &list);

        let snapshot = {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.notifications = list;
            state.unread_count = count;
            state.clone()
        };
        let _ = self.watch_tx.send(snapshot);

        for delivery in &deliveries {
            let notification = &delivery.notification;
            let fired = self.notifier.show(
                &notification.title,
                &notification.message,
                notification.kind,
                delivery.play_sound,
                notification.reference_id.as_deref(),
            );
            if !fired {
                tracing::debug!(id = %notification.id, "Desktop delivery did not fire");
            }
        }
    }

    fn publish(&self, snapshot: FeedSnapshot) {
        let _ = self.watch_tx.send(snapshot);
    }
}

/// Handle one UI consumer holds for the lifetime of its subscription.
pub struct NotificationFeed {
    inner: Arc<FeedInner>,
    _guard: PollerGuard,
}

impl NotificationFeed {
    /// Subscribe to the notification feed of one portal side.
    ///
    /// Joins the shared `(Notifications, user_type)` poller and runs one
    /// immediate cycle rather than waiting for the first tick. Must be
    /// called from within a tokio runtime.
    pub fn subscribe(
        user_type: UserType,
        config: &ClientConfig,
        source: Arc<dyn NotificationSource>,
        notifier: Arc<dyn DesktopNotifier>,
        cache: CacheStore,
        registry: Arc<PollerRegistry>,
    ) -> Self {
        let schedule = RetrySchedule::from_config(&config.retry);
        let inner = Arc::new(FeedInner {
            user_type,
            source,
            notifier,
            fetcher: Fetcher::new(cache),
            list_options: FetchOptions::new(
                schedule.clone(),
                RetryPolicy::TransportOnly,
                Some(cache_key(FeedPurpose::Notifications, user_type)),
            ),
            count_options: FetchOptions::new(
                schedule,
                RetryPolicy::TransportOnly,
                Some(unread_count_cache_key(user_type)),
            ),
            state: Mutex::new(FeedSnapshot::default()),
            diff: Mutex::new(DiffEngine::new(Duration::from_millis(config.lookback_ms))),
            watch_tx: watch::channel(FeedSnapshot::default()).0,
            closed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let callback: PollCallback = Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    inner.run_cycle().await;
                }
            })
        });
        let guard = registry.register(
            PollKey::new(FeedPurpose::Notifications, user_type),
            config.poll_period(FeedPurpose::Notifications),
            callback,
        );

        let immediate = Arc::clone(&inner);
        tokio::spawn(async move {
            immediate.run_cycle().await;
        });

        Self {
            inner,
            _guard: guard,
        }
    }

    /// Current feed state.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.inner.watch_tx.subscribe()
    }

    /// Run one out-of-band cycle, identical to a timer tick. Backing for
    /// UI refresh buttons.
    pub async fn refresh(&self) {
        self.inner.run_cycle().await;
    }

    /// Optimistically mark one notification read, then tell the server.
    ///
    /// The unread count drops by at most one and never below zero. The
    /// server call is fire-and-forget: a failure is logged, not rolled
    /// back, and the next poll cycle restores the server's view anyway.
    pub fn mark_as_read(&self, id: &NotificationId) {
        let snapshot = {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(notification) = state
                .notifications
                .iter_mut()
                .find(|notification| &notification.id == id)
            {
                if !notification.is_read {
                    notification.is_read = true;
                    state.unread_count = state.unread_count.saturating_sub(1);
                }
            }
            state.clone()
        };
        self.inner.publish(snapshot);

        let source = Arc::clone(&self.inner.source);
        let user_type = self.inner.user_type;
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(err) = source.mark_read(user_type, &id).await {
                tracing::warn!(%id, error = %err, "Failed to mark notification read on server");
            }
        });
    }

    /// Optimistically mark everything read and zero the unread count, then
    /// issue exactly one server call - also when the count is already zero.
    pub fn mark_all_read(&self) {
        let snapshot = {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for notification in &mut state.notifications {
                notification.is_read = true;
            }
            state.unread_count = 0;
            state.clone()
        };
        self.inner.publish(snapshot);

        let source = Arc::clone(&self.inner.source);
        let user_type = self.inner.user_type;
        tokio::spawn(async move {
            if let Err(err) = source.mark_all_read(user_type).await {
                tracing::warn!(error = %err, "Failed to mark all notifications read on server");
            }
        });
    }

    // Desktop-notification capability passthroughs.

    pub fn notifier_supported(&self) -> bool {
        self.inner.notifier.is_supported()
    }

    pub fn notifier_enabled(&self) -> bool {
        self.inner.notifier.is_enabled()
    }

    pub fn permission_status(&self) -> PermissionStatus {
        self.inner.notifier.permission_status()
    }

    pub fn request_permission(&self) -> PermissionStatus {
        self.inner.notifier.request_permission()
    }
}

impl Drop for NotificationFeed {
    fn drop(&mut self) {
        // The guard unregisters after this; the flag stops any cycle still
        // in flight from writing through a dead subscription.
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}
