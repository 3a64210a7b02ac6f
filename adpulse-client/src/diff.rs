//! New-notification detection between poll cycles.
//!
//! The first fetch after subscribing is a baseline sync: historical unread
//! notifications are adopted silently so a page load never replays them as
//! alerts. After that, an item counts as new when it is unread and its
//! `created_at` falls inside the lookback window.
//!
//! Invariant: the lookback must exceed expected fetch latency so a slow
//! delivery is never missed. When the poll period is shorter than or equal
//! to the lookback, an item can land inside two consecutive windows and be
//! announced twice; the window is sized so that happens at most once per
//! item. Missing an item is the failure mode this trades away.

use adpulse_core::Notification;
use adpulse_core::Timestamp;
use chrono::TimeDelta;
use std::time::Duration;

/// One side-effect delivery owed for a newly arrived notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub notification: Notification,
    /// Only the first delivery of a batch carries the sound cue.
    pub play_sound: bool,
}

/// Stateful comparator fed one fresh fetch per poll cycle.
#[derive(Debug)]
pub struct DiffEngine {
    initialized: bool,
    lookback: TimeDelta,
}

impl DiffEngine {
    pub fn new(lookback: Duration) -> Self {
        Self {
            initialized: false,
            lookback: TimeDelta::milliseconds(lookback.as_millis() as i64),
        }
    }

    /// Compare a fresh fetch against the previous state of the world.
    ///
    /// Returns the deliveries owed for this cycle; the caller adopts
    /// `fresh` as current state regardless.
    pub fn diff(&mut self, now: Timestamp, fresh: &[Notification]) -> Vec<Delivery> {
        if !self.initialized {
            self.initialized = true;
            tracing::debug!(count = fresh.len(), "Baseline sync, no deliveries");
            return Vec::new();
        }

        let mut deliveries = Vec::new();
        for notification in fresh {
            if notification.is_read || !notification.is_recent(now, self.lookback) {
                continue;
            }
            deliveries.push(Delivery {
                notification: notification.clone(),
                play_sound: deliveries.is_empty(),
            });
        }

        if !deliveries.is_empty() {
            tracing::info!(count = deliveries.len(), "New notifications detected");
        }
        deliveries
    }

    /// Whether the baseline sync has happened yet.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpulse_core::{NotificationId, NotificationKind};
    use chrono::Utc;

    fn notification(id: &str, created_at: Timestamp, is_read: bool) -> Notification {
        Notification {
            id: NotificationId::new(id),
            title: "Account request update".to_string(),
            message: "Your Facebook ad account request moved to review.".to_string(),
            kind: NotificationKind::AccountRequest,
            reference_id: Some("req-5".to_string()),
            created_at,
            is_read,
        }
    }

    #[test]
    fn test_first_fetch_is_silent_baseline() {
        let mut engine = DiffEngine::new(Duration::from_secs(15));
        let now = Utc::now();
        // Ten historical unread notifications, all older than the window.
        let fresh: Vec<_> = (0..10)
            .map(|i| notification(&format!("n-{i}"), now - TimeDelta::hours(1), false))
            .collect();

        let deliveries = engine.diff(now, &fresh);

        assert!(deliveries.is_empty());
        assert!(engine.is_initialized());
    }

    #[test]
    fn test_fresh_unread_items_detected_after_baseline() {
        let mut engine = DiffEngine::new(Duration::from_secs(15));
        let now = Utc::now();
        engine.diff(now, &[]);

        let fresh = vec![
            notification("n-1", now - TimeDelta::seconds(2), false),
            notification("n-2", now - TimeDelta::seconds(3), false),
        ];
        let deliveries = engine.diff(now, &fresh);

        assert_eq!(deliveries.len(), 2);
        assert!(deliveries[0].play_sound);
        assert!(!deliveries[1].play_sound);
    }

    #[test]
    fn test_read_items_never_delivered() {
        let mut engine = DiffEngine::new(Duration::from_secs(15));
        let now = Utc::now();
        engine.diff(now, &[]);

        let fresh = vec![notification("n-1", now - TimeDelta::seconds(1), true)];
        assert!(engine.diff(now, &fresh).is_empty());
    }

    #[test]
    fn test_items_outside_lookback_ignored() {
        let mut engine = DiffEngine::new(Duration::from_secs(15));
        let now = Utc::now();
        engine.diff(now, &[]);

        let fresh = vec![notification("n-1", now - TimeDelta::seconds(16), false)];
        assert!(engine.diff(now, &fresh).is_empty());
    }

    #[test]
    fn test_item_in_two_windows_announced_at_most_twice() {
        // Poll period (10s) shorter than lookback (15s): the same item can
        // be seen by two consecutive cycles and no more.
        let mut engine = DiffEngine::new(Duration::from_secs(15));
        let created = Utc::now();
        engine.diff(created, &[]);

        let item = notification("n-1", created, false);
        let mut announcements = 0;
        // Cycles at +4s, +14s, +24s, +34s: the first two fall inside the
        // 15s window, the rest do not.
        for cycle in 0..4 {
            let now = created + TimeDelta::seconds(4 + 10 * cycle);
            announcements += engine.diff(now, std::slice::from_ref(&item)).len();
        }
        assert_eq!(announcements, 2);
    }
}
