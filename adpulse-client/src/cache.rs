//! Last-known-good response cache.
//!
//! The substrate is a string key-value store (the browser-localStorage
//! analog); JSON (de)serialization happens at this boundary. Entries have
//! no expiry: they are overwritten on every successful fetch and read only
//! when a live fetch has exhausted its retries. The system deliberately
//! prefers stale-but-present data over an error state.

use crate::constants::CACHE_KEY_PREFIX;
use adpulse_core::{FeedPurpose, UserType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// String-semantics persistent key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

/// Process-local store for tests and tokenless demo runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
    }
}

/// Store backed by a single JSON document on disk.
///
/// The whole document is rewritten on every `set`; entry counts are small
/// (one per feed per user type) so this stays cheap.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store, loading any existing document. A missing or
    /// unparseable file starts the store empty.
    pub fn open(path: PathBuf) -> Self {
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str::<HashMap<String, String>>(&contents).ok())
            .unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        let contents = match serde_json::to_string_pretty(entries) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to serialize cache document");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %err, path = %self.path.display(), "Failed to create cache directory");
                return;
            }
        }
        if let Err(err) = std::fs::write(&self.path, contents) {
            tracing::warn!(error = %err, path = %self.path.display(), "Failed to write cache document");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value);
        self.flush(&entries);
    }
}

/// JSON-typed view over a [`KeyValueStore`].
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Persist `value` under `key`, overwriting any prior entry.
    ///
    /// Never fails observably: a serialization error is logged and the old
    /// entry (if any) is left in place.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.store.set(key, json),
            Err(err) => {
                tracing::warn!(key, error = %err, "Failed to serialize cache entry");
            }
        }
    }

    /// Read the last written value for `key`.
    ///
    /// An absent or unparseable entry returns `None`; the caller supplies
    /// the type-appropriate empty default.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(key, error = %err, "Malformed cache entry treated as miss");
                None
            }
        }
    }
}

/// Cache key for one data class of one portal side, e.g.
/// `cached_notifications_admin`.
pub fn cache_key(purpose: FeedPurpose, user_type: UserType) -> String {
    format!("{}_{}_{}", CACHE_KEY_PREFIX, purpose, user_type)
}

/// Cache key for the unread-notification counter of one portal side.
pub fn unread_count_cache_key(user_type: UserType) -> String {
    format!("{}_unread_count_{}", CACHE_KEY_PREFIX, user_type)
}
