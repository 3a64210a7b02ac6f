//! Discriminator enums shared across the ADPULSE client crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the portal a consumer belongs to.
///
/// The user type selects the bearer token, the endpoint path prefix, and the
/// cache namespace. Admin and client consumers never share a poller or a
/// cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    Client,
}

impl UserType {
    /// Stable lowercase name used in cache keys and endpoint paths.
    pub const fn as_str(&self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::Client => "client",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classes of notification the resale portal emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A new ad-account request (Facebook/Google/TikTok) was filed or updated.
    AccountRequest,
    /// A wallet top-up was submitted or confirmed.
    Deposit,
    /// A withdrawal was requested or processed.
    Withdrawal,
    /// A currency exchange was requested or completed.
    Exchange,
    /// A payment receipt is awaiting manual verification.
    PaymentReview,
    /// Anything the server does not classify further.
    System,
}

impl NotificationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AccountRequest => "account_request",
            NotificationKind::Deposit => "deposit",
            NotificationKind::Withdrawal => "withdrawal",
            NotificationKind::Exchange => "exchange",
            NotificationKind::PaymentReview => "payment_review",
            NotificationKind::System => "system",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The data classes the portal refreshes in the background.
///
/// Each purpose runs its own poller singleton per [`UserType`]; purposes
/// never share a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPurpose {
    Notifications,
    Dashboard,
    Transactions,
    Accounts,
}

impl FeedPurpose {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FeedPurpose::Notifications => "notifications",
            FeedPurpose::Dashboard => "dashboard",
            FeedPurpose::Transactions => "transactions",
            FeedPurpose::Accounts => "accounts",
        }
    }
}

impl fmt::Display for FeedPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
