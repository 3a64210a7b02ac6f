//! ADPULSE Core - Entity Types
//!
//! Pure data structures shared by every ADPULSE client crate. This crate
//! contains ONLY data types and trivial helpers - no IO, no business logic.

use chrono::{DateTime, Utc};

pub mod enums;
pub mod notification;

pub use enums::{FeedPurpose, NotificationKind, UserType};
pub use notification::{Notification, NotificationId};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
