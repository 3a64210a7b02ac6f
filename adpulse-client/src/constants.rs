//! Compiled defaults for every client tunable.
//!
//! Config files override these; nothing else in the crate hardcodes a
//! number.

/// Poll period for the notification feed (milliseconds).
pub const DEFAULT_NOTIFICATIONS_POLL_MS: u64 = 60_000;

/// Poll period for dashboard summaries (milliseconds).
pub const DEFAULT_DASHBOARD_POLL_MS: u64 = 10_000;

/// Poll period for transaction lists (milliseconds).
pub const DEFAULT_TRANSACTIONS_POLL_MS: u64 = 30_000;

/// Poll period for account lists (milliseconds).
pub const DEFAULT_ACCOUNTS_POLL_MS: u64 = 30_000;

/// Retry attempts after the initial request fails.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// First retry delay; doubles each attempt.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;

/// Ceiling on the retry delay.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;

/// How far back a notification's `created_at` may lie and still count as
/// newly arrived. Must exceed expected fetch latency; see `diff`.
pub const DEFAULT_LOOKBACK_MS: u64 = 15_000;

/// Client-side timeout for each HTTP request, independent of retry backoff.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Prefix for every cache key written by the client.
pub const CACHE_KEY_PREFIX: &str = "cached";
