//! ADPULSE resilient polling data client.
//!
//! Generalizes the fetch/retry/cache pattern the portal's screens share
//! into one reusable stack: a [`cache::CacheStore`] of last-known-good
//! responses, a [`fetcher::Fetcher`] with bounded backoff that never
//! surfaces an error, a [`poller::PollerRegistry`] of shared timers, a
//! [`diff::DiffEngine`] that decides which notifications are newly
//! arrived, and the [`feed::NotificationFeed`] facade UI code binds to.

pub mod auth;
pub mod cache;
pub mod config;
pub mod constants;
pub mod diff;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod notifier;
pub mod poller;
pub mod rest;

pub use auth::{StaticTokenProvider, TokenProvider};
pub use cache::{cache_key, unread_count_cache_key, CacheStore, FileStore, KeyValueStore, MemoryStore};
pub use config::{AuthConfig, ClientConfig, ConfigError, PollConfig, RetryConfig};
pub use diff::{Delivery, DiffEngine};
pub use error::{ClientError, RetryPolicy};
pub use feed::{FeedSnapshot, NotificationFeed};
pub use fetcher::{FetchOptions, Fetcher, FetcherSnapshot, RetrySchedule};
pub use notifier::{DesktopNotifier, NoopNotifier, PermissionStatus};
pub use poller::{PollCallback, PollKey, PollerGuard, PollerRegistry};
pub use rest::{NotificationSource, RestClient};
