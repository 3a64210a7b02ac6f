//! The notification entity.
//!
//! Notifications are owned by the server; the client holds a read-only
//! cached copy. The only local mutation is flipping `is_read`, which is
//! always followed by a server call.

use crate::enums::NotificationKind;
use crate::Timestamp;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-issued notification identifier.
///
/// Opaque string rather than a UUID: the portal backend issues ids in more
/// than one format depending on the originating subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A single portal notification as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Id of the entity this notification refers to (request, transaction),
    /// if any.
    pub reference_id: Option<String>,
    pub created_at: Timestamp,
    pub is_read: bool,
}

impl Notification {
    /// Whether this notification was created within `lookback` of `now`.
    ///
    /// Clock skew between server and client can put `created_at` slightly in
    /// the future; a future timestamp still counts as recent.
    pub fn is_recent(&self, now: Timestamp, lookback: TimeDelta) -> bool {
        now.signed_duration_since(self.created_at) < lookback
    }
}
