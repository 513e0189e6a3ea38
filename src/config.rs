//! Gateway configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Endpoint paths are relative to the API base URL and keep the backend's
//! trailing-slash convention. The base URL is stored without a trailing `/`
//! so `GatewayConfig::url` can join with a single separator.

use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CREDENTIALS_PATH: &str = ".sangyan/credentials.json";

// =============================================================================
// ENDPOINTS
// =============================================================================

/// Token issuance. Also the prefix of `token/refresh/`.
pub const TOKEN_PATH: &str = "token/";
pub const LOGOUT_PATH: &str = "auth/logout/";
pub const REGISTER_PATH: &str = "users/";
pub const CREDIT_PATH: &str = "users/paras/add/";
pub const SPEND_PATH: &str = "users/paras/spend/";

/// Profile resource for a user id (`GET` / `PATCH`).
#[must_use]
pub fn profile_path(user_id: &str) -> String {
    format!("users/{user_id}/")
}

/// Whether `path` addresses the token-issuance family of endpoints.
///
/// A 401 from these means "bad credentials", not "session expired".
#[must_use]
pub fn is_token_path(path: &str) -> bool {
    path.trim_start_matches('/').starts_with(TOKEN_PATH)
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeouts: Timeouts,
    pub credentials_path: PathBuf,
}

impl GatewayConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `SANGYAN_API_BASE_URL`: default `http://localhost:8000/api`
    /// - `SANGYAN_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SANGYAN_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SANGYAN_CREDENTIALS_PATH`: default `.sangyan/credentials.json`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if `SANGYAN_API_BASE_URL` is set but empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_base = std::env::var("SANGYAN_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        Self::from_env_with_base_url(&raw_base)
    }

    /// Like [`GatewayConfig::from_env`], but with an explicit base URL;
    /// `SANGYAN_API_BASE_URL` is not read.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if `base_url` is empty.
    pub fn from_env_with_base_url(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(base_url)?;
        let timeouts = Timeouts {
            request_secs: env_parse_u64("SANGYAN_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("SANGYAN_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let credentials_path = std::env::var("SANGYAN_CREDENTIALS_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_CREDENTIALS_PATH), PathBuf::from);

        Ok(Self { base_url, timeouts, credentials_path })
    }

    #[must_use]
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }


}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Parse("SANGYAN_API_BASE_URL must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
