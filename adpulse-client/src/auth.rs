//! Bearer-token retrieval seam.
//!
//! The client never manages login or session expiry; it only asks an
//! external collaborator for the current token of a portal side. No token
//! means the fetch short-circuits to its empty default.

use crate::config::AuthConfig;
use adpulse_core::UserType;

/// Source of bearer tokens, keyed by portal side.
pub trait TokenProvider: Send + Sync {
    fn token(&self, user_type: UserType) -> Option<String>;
}

/// Fixed tokens taken from config at startup.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    admin: Option<String>,
    client: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(admin: Option<String>, client: Option<String>) -> Self {
        Self { admin, client }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            admin: auth.admin_token.clone(),
            client: auth.client_token.clone(),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self, user_type: UserType) -> Option<String> {
        match user_type {
            UserType::Admin => self.admin.clone(),
            UserType::Client => self.client.clone(),
        }
    }
}
