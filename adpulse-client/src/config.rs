//! Configuration loading for the ADPULSE polling client.
//!
//! Loaded from a TOML file named by `--config` or `ADPULSE_CONFIG`. Every
//! tunable has a compiled default from `constants`; a config file only
//! needs the fields it overrides, plus the required `api_base_url` and at
//! least one bearer token.

use crate::constants::{
    DEFAULT_ACCOUNTS_POLL_MS, DEFAULT_DASHBOARD_POLL_MS, DEFAULT_INITIAL_BACKOFF_MS,
    DEFAULT_LOOKBACK_MS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_NOTIFICATIONS_POLL_MS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TRANSACTIONS_POLL_MS,
};
use adpulse_core::FeedPurpose;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub auth: AuthConfig,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_lookback_ms")]
    pub lookback_ms: u64,
    /// File backing the cache store. Absent means in-memory only.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Bearer tokens per portal side. Both optional, but at least one must be
/// present; a feed for a side with no token short-circuits to its empty
/// default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub admin_token: Option<String>,
    pub client_token: Option<String>,
}

/// Poll period per data class, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    #[serde(default = "default_notifications_poll_ms")]
    pub notifications_ms: u64,
    #[serde(default = "default_dashboard_poll_ms")]
    pub dashboard_ms: u64,
    #[serde(default = "default_transactions_poll_ms")]
    pub transactions_ms: u64,
    #[serde(default = "default_accounts_poll_ms")]
    pub accounts_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            notifications_ms: DEFAULT_NOTIFICATIONS_POLL_MS,
            dashboard_ms: DEFAULT_DASHBOARD_POLL_MS,
            transactions_ms: DEFAULT_TRANSACTIONS_POLL_MS,
            accounts_ms: DEFAULT_ACCOUNTS_POLL_MS,
        }
    }
}

/// Bounded exponential backoff schedule for failed fetches.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or ADPULSE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.auth.admin_token.is_none() && self.auth.client_token.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "auth",
                reason: "admin_token or client_token must be provided".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.lookback_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "lookback_ms",
                reason: "must be > 0".to_string(),
            });
        }
        for (field, value) in [
            ("poll.notifications_ms", self.poll.notifications_ms),
            ("poll.dashboard_ms", self.poll.dashboard_ms),
            ("poll.transactions_ms", self.poll.transactions_ms),
            ("poll.accounts_ms", self.poll.accounts_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be > 0".to_string(),
                });
            }
        }
        if self.retry.initial_backoff_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.initial_backoff_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_backoff_ms",
                reason: "must be >= retry.initial_backoff_ms".to_string(),
            });
        }
        Ok(())
    }

    /// Poll period for a data class.
    pub fn poll_period(&self, purpose: FeedPurpose) -> Duration {
        let ms = match purpose {
            FeedPurpose::Notifications => self.poll.notifications_ms,
            FeedPurpose::Dashboard => self.poll.dashboard_ms,
            FeedPurpose::Transactions => self.poll.transactions_ms,
            FeedPurpose::Accounts => self.poll.accounts_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("ADPULSE_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_lookback_ms() -> u64 {
    DEFAULT_LOOKBACK_MS
}

fn default_notifications_poll_ms() -> u64 {
    DEFAULT_NOTIFICATIONS_POLL_MS
}

fn default_dashboard_poll_ms() -> u64 {
    DEFAULT_DASHBOARD_POLL_MS
}

fn default_transactions_poll_ms() -> u64 {
    DEFAULT_TRANSACTIONS_POLL_MS
}

fn default_accounts_poll_ms() -> u64 {
    DEFAULT_ACCOUNTS_POLL_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ClientConfig {
        ClientConfig {
            api_base_url: "http://localhost:8080".to_string(),
            auth: AuthConfig {
                admin_token: Some("test-admin-token".to_string()),
                client_token: None,
            },
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            lookback_ms: DEFAULT_LOOKBACK_MS,
            cache_path: None,
            poll: PollConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    #[test]
    fn test_base_config_is_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let mut config = base_config();
        config.api_base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_requires_at_least_one_token() {
        let mut config = base_config();
        config.auth = AuthConfig {
            admin_token: None,
            client_token: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_period_rejected() {
        let mut config = base_config();
        config.poll.dashboard_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_ceiling_below_initial_rejected() {
        let mut config = base_config();
        config.retry.initial_backoff_ms = 4_000;
        config.retry.max_backoff_ms = 2_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let toml = r#"
            api_base_url = "https://portal.example.com"

            [auth]
            client_token = "tok"
        "#;
        let config: ClientConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.poll.notifications_ms, DEFAULT_NOTIFICATIONS_POLL_MS);
        assert_eq!(config.retry.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(
            config.poll_period(FeedPurpose::Dashboard),
            Duration::from_millis(DEFAULT_DASHBOARD_POLL_MS)
        );
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let toml = r#"
            api_base_url = "https://portal.example.com"
            websocket_url = "wss://portal.example.com"

            [auth]
            client_token = "tok"
        "#;
        assert!(toml::from_str::<ClientConfig>(toml).is_err());
    }
}
