//! ADPULSE Test Utilities
//!
//! Centralized test infrastructure for the ADPULSE workspace:
//! - Scripted mock data source with per-endpoint response queues
//! - Recording mock notifier
//! - Fixtures for notification entities
//!
//! Mock collaborators implement the real client ports, so the same doubles
//! serve in-module unit tests and the integration suites.

// Re-export core types for convenience
pub use adpulse_core::{
    FeedPurpose, Notification, NotificationId, NotificationKind, Timestamp, UserType,
};

use adpulse_client::error::ClientError;
use adpulse_client::notifier::{DesktopNotifier, PermissionStatus};
use adpulse_client::rest::NotificationSource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// SCRIPTED DATA SOURCE
// ============================================================================

/// Mock data source fed from per-endpoint response queues.
///
/// Each fetch pops the front of its queue; an empty queue serves the
/// endpoint's empty default, so a test only scripts the cycles it cares
/// about. Mutation endpoints record their calls and can be told to fail.
#[derive(Default)]
pub struct ScriptedSource {
    list_responses: Mutex<VecDeque<Result<Vec<Notification>, ClientError>>>,
    count_responses: Mutex<VecDeque<Result<u64, ClientError>>>,
    fail_mutations: Mutex<Option<String>>,
    latency: Mutex<Option<Duration>>,
    list_calls: AtomicU64,
    count_calls: AtomicU64,
    mark_read_calls: AtomicU64,
    mark_all_read_calls: AtomicU64,
    marked_ids: Mutex<Vec<NotificationId>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `list_notifications` response.
    pub fn push_list(&self, response: Result<Vec<Notification>, ClientError>) {
        self.list_responses.lock().unwrap().push_back(response);
    }

    /// Queue the next `unread_count` response.
    pub fn push_count(&self, response: Result<u64, ClientError>) {
        self.count_responses.lock().unwrap().push_back(response);
    }

    /// Make every mutation endpoint fail with a transport error.
    pub fn fail_mutations(&self, message: impl Into<String>) {
        *self.fail_mutations.lock().unwrap() = Some(message.into());
    }

    /// Delay every fetch by `latency`, simulating a slow server.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    pub fn count_calls(&self) -> u64 {
        self.count_calls.load(Ordering::Relaxed)
    }

    pub fn mark_read_calls(&self) -> u64 {
        self.mark_read_calls.load(Ordering::Relaxed)
    }

    pub fn mark_all_read_calls(&self) -> u64 {
        self.mark_all_read_calls.load(Ordering::Relaxed)
    }

    /// Ids the caller asked to mark read, in call order.
    pub fn marked_ids(&self) -> Vec<NotificationId> {
        self.marked_ids.lock().unwrap().clone()
    }

    fn mutation_result(&self) -> Result<(), ClientError> {
        match self.fail_mutations.lock().unwrap().clone() {
            Some(message) => Err(ClientError::Transport { message }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NotificationSource for ScriptedSource {
    async fn list_notifications(
        &self,
        _user_type: UserType,
    ) -> Result<Vec<Notification>, ClientError> {
        self.simulate_latency().await;
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.list_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn unread_count(&self, _user_type: UserType) -> Result<u64, ClientError> {
        self.simulate_latency().await;
        self.count_calls.fetch_add(1, Ordering::Relaxed);
        self.count_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(0))
    }

    async fn mark_read(
        &self,
        _user_type: UserType,
        id: &NotificationId,
    ) -> Result<(), ClientError> {
        self.mark_read_calls.fetch_add(1, Ordering::Relaxed);
        self.marked_ids.lock().unwrap().push(id.clone());
        self.mutation_result()
    }

    async fn mark_all_read(&self, _user_type: UserType) -> Result<(), ClientError> {
        self.mark_all_read_calls.fetch_add(1, Ordering::Relaxed);
        self.mutation_result()
    }
}

/// Retryable failure for scripting fetch outages.
pub fn transport_failure() -> ClientError {
    ClientError::Transport {
        message: "connection reset by peer".to_string(),
    }
}

// ============================================================================
// RECORDING NOTIFIER
// ============================================================================

/// One delivery captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShownNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub play_sound: bool,
    pub reference_id: Option<String>,
}

/// Mock desktop notifier that records every delivery.
pub struct RecordingNotifier {
    shown: Mutex<Vec<ShownNotification>>,
    permission: Mutex<PermissionStatus>,
}

impl RecordingNotifier {
    /// A notifier with permission already granted.
    pub fn granted() -> Self {
        Self {
            shown: Mutex::new(Vec::new()),
            permission: Mutex::new(PermissionStatus::Granted),
        }
    }

    /// A notifier that has not been asked for permission yet.
    pub fn unasked() -> Self {
        Self {
            shown: Mutex::new(Vec::new()),
            permission: Mutex::new(PermissionStatus::Default),
        }
    }

    /// Deliveries captured so far, in delivery order.
    pub fn shown(&self) -> Vec<ShownNotification> {
        self.shown.lock().unwrap().clone()
    }
}

impl DesktopNotifier for RecordingNotifier {
    fn is_supported(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        *self.permission.lock().unwrap() == PermissionStatus::Granted
    }

    fn permission_status(&self) -> PermissionStatus {
        *self.permission.lock().unwrap()
    }

    fn request_permission(&self) -> PermissionStatus {
        let mut permission = self.permission.lock().unwrap();
        if *permission == PermissionStatus::Default {
            *permission = PermissionStatus::Granted;
        }
        *permission
    }

    fn show(
        &self,
        title: &str,
        message: &str,
        kind: NotificationKind,
        play_sound: bool,
        reference_id: Option<&str>,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.shown.lock().unwrap().push(ShownNotification {
            title: title.to_string(),
            message: message.to_string(),
            kind,
            play_sound,
            reference_id: reference_id.map(str::to_string),
        });
        true
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A deposit notification with a generated reference id.
pub fn sample_notification(id: &str, created_at: Timestamp, is_read: bool) -> Notification {
    Notification {
        id: NotificationId::new(id),
        title: format!("Update {id}"),
        message: "Your wallet top-up was confirmed.".to_string(),
        kind: NotificationKind::Deposit,
        reference_id: Some(uuid::Uuid::new_v4().to_string()),
        created_at,
        is_read,
    }
}

/// `count` unread notifications sharing one creation time.
pub fn unread_batch(count: usize, created_at: Timestamp) -> Vec<Notification> {
    (0..count)
        .map(|i| sample_notification(&format!("n-{i}"), created_at, false))
        .collect()
}
