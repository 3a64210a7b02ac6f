//! Desktop-notification capability seam.
//!
//! The delivery channel (OS toast, browser Notification API, tray icon) is
//! an opaque collaborator. The client only needs presence/absence, the
//! permission state, and a boolean "did it fire" answer from `show`.

use adpulse_core::NotificationKind;

/// Permission state of the desktop-notification capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// Not yet asked.
    Default,
}

/// Delivery channel for newly arrived notifications.
pub trait DesktopNotifier: Send + Sync {
    /// Whether the platform offers desktop notifications at all.
    fn is_supported(&self) -> bool;

    /// Whether delivery is currently possible (supported and permitted).
    fn is_enabled(&self) -> bool;

    fn permission_status(&self) -> PermissionStatus;

    /// Ask the platform for permission. Returns the resulting status.
    fn request_permission(&self) -> PermissionStatus;

    /// Deliver one notification. Returns whether it actually fired.
    fn show(
        &self,
        title: &str,
        message: &str,
        kind: NotificationKind,
        play_sound: bool,
        reference_id: Option<&str>,
    ) -> bool;
}

/// No-op notifier for headless runs and platforms without a channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl NoopNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl DesktopNotifier for NoopNotifier {
    fn is_supported(&self) -> bool {
        false
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn permission_status(&self) -> PermissionStatus {
        PermissionStatus::Denied
    }

    fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Denied
    }

    fn show(
        &self,
        _title: &str,
        _message: &str,
        _kind: NotificationKind,
        _play_sound: bool,
        _reference_id: Option<&str>,
    ) -> bool {
        false
    }
}
