//! Configuration module for Dropgate.

use serde::Deserialize;
use std::path::Path;

use crate::{DropgateError, Result};

/// Minimum length of the server secret.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timezone used when exporting audit logs (e.g., "Europe/Berlin", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Request timeout for the management API in seconds.
    ///
    /// Download routes are never wrapped in a timeout; slow clients may take as
    /// long as they need to receive a large file.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_api_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timezone: default_timezone(),
            api_timeout_secs: default_api_timeout(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/dropgate.db".to_string()
}

fn default_max_connections() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Path to the file storage directory.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_storage_path() -> String {
    "data/files".to_string()
}

fn default_max_upload_size() -> u64 {
    1024
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

/// Secrets and credential lifetimes.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Server secret. Signs cookies and JWTs and encrypts file passwords at rest.
    #[serde(default)]
    pub secret: String,
    /// Access token expiry in seconds for system users.
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_token_expiry_secs: u64,
    /// Lifetime of the per-file "password verified" credential in hours.
    #[serde(default = "default_password_cookie_ttl")]
    pub password_cookie_ttl_hours: u64,
    /// Lifetime of the per-file download session credential in hours.
    #[serde(default = "default_session_cookie_ttl")]
    pub session_cookie_ttl_hours: u64,
    /// Lifetime of the global download-account session in days.
    #[serde(default = "default_account_cookie_ttl")]
    pub account_cookie_ttl_days: u64,
}

fn default_jwt_access_expiry() -> u64 {
    3600
}

fn default_password_cookie_ttl() -> u64 {
    24
}

fn default_session_cookie_ttl() -> u64 {
    24
}

fn default_account_cookie_ttl() -> u64 {
    30
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            jwt_access_token_expiry_secs: default_jwt_access_expiry(),
            password_cookie_ttl_hours: default_password_cookie_ttl(),
            session_cookie_ttl_hours: default_session_cookie_ttl(),
            account_cookie_ttl_days: default_account_cookie_ttl(),
        }
    }
}

/// Owner notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Whether download notifications are dispatched at all.
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    /// Number of notification workers.
    #[serde(default = "default_notification_workers")]
    pub workers: usize,
    /// Maximum number of queued notifications before new ones are dropped.
    #[serde(default = "default_notification_queue")]
    pub queue_capacity: usize,
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_notification_workers() -> usize {
    4
}

fn default_notification_queue() -> usize {
    256
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            workers: default_notification_workers(),
            queue_capacity: default_notification_queue(),
        }
    }
}

/// Rate limit configuration (requests per minute, per client IP).
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Limit for the system-user login endpoint.
    #[serde(default = "default_login_rate_limit")]
    pub login_per_minute: u32,
    /// Limit for password / login submissions on download links.
    #[serde(default = "default_unlock_rate_limit")]
    pub unlock_per_minute: u32,
}

fn default_login_rate_limit() -> u32 {
    5
}

fn default_unlock_rate_limit() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_per_minute: default_login_rate_limit(),
            unlock_per_minute: default_unlock_rate_limit(),
        }
    }
}

/// Web configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebConfig {
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty logs to stdout only.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/dropgate.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// First administrator, created at startup when the user table is empty.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminConfig {
    /// Username of the bootstrap administrator.
    #[serde(default)]
    pub username: String,
    /// Password of the bootstrap administrator. Only read from the environment.
    #[serde(skip)]
    pub password: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// File storage configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Secrets and credential lifetimes.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Owner notifications.
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Rate limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Web configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Bootstrap administrator.
    #[serde(default)]
    pub admin: AdminConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DropgateError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| DropgateError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `DROPGATE_SECRET`: override the server secret
    /// - `DROPGATE_ADMIN_PASSWORD`: password of the bootstrap administrator
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("DROPGATE_SECRET") {
            if !secret.is_empty() {
                self.security.secret = secret;
            }
        }
        if let Ok(password) = std::env::var("DROPGATE_ADMIN_PASSWORD") {
            if !password.is_empty() {
                self.admin.password = Some(password);
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the server secret is missing or too short, or if the
    /// notification pool would have no workers.
    pub fn validate(&self) -> Result<()> {
        if self.security.secret.len() < MIN_SECRET_LENGTH {
            return Err(DropgateError::Config(format!(
                "security.secret must be at least {MIN_SECRET_LENGTH} characters. \
                 Set it in config.toml or via the DROPGATE_SECRET environment variable."
            )));
        }
        if self.notifications.enabled && self.notifications.workers == 0 {
            return Err(DropgateError::Config(
                "notifications.workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
