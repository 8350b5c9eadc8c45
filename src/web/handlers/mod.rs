//! API handlers and the state they share.

pub mod account;
pub mod audit;
pub mod auth;
pub mod download;
pub mod file;
pub mod team;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

use crate::account::DownloadAccountDirectory;
use crate::audit::AuditEmitter;
use crate::auth::{cookie_key_material, SecretBox};
use crate::config::Config;
use crate::db::{User, UserRepository};
use crate::download::{GateChain, GateConfig};
use crate::file::{FileService, FileStorage};
use crate::notify::NotificationPool;
use crate::team::TeamAccessResolver;
use crate::web::error::ApiError;
use crate::web::middleware::{JwtClaims, JwtState};
use crate::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database handle.
    pub db: Database,
    /// Owner-side file operations.
    pub files: FileService,
    /// Retrieval gate chain.
    pub gate: GateChain,
    /// Team membership and share checks.
    pub teams: TeamAccessResolver,
    /// Download accounts.
    pub accounts: DownloadAccountDirectory,
    /// Audit log writer.
    pub audit: AuditEmitter,
    /// Access token issuing and checking.
    pub jwt: Arc<JwtState>,
    /// Signing key for gate cookies.
    pub cookie_key: Key,
    /// Timezone for CSV export.
    pub timezone: String,
    /// Maximum upload size in bytes.
    pub max_upload_size: u64,
}

impl AppState {
    /// Wire services from configuration.
    pub fn new(
        db: Database,
        storage: FileStorage,
        config: &Config,
        notifications: NotificationPool,
    ) -> Self {
        let pool = db.pool().clone();
        let secret = &config.security.secret;
        let secrets = SecretBox::from_secret(secret);
        let max_upload_size = config.files.max_upload_size_mb * 1024 * 1024;

        let gate_config = GateConfig {
            password_ttl_secs: config.security.password_cookie_ttl_hours as i64 * 3600,
            session_ttl_secs: config.security.session_cookie_ttl_hours as i64 * 3600,
            account_ttl_secs: config.security.account_cookie_ttl_days as i64 * 24 * 3600,
        };

        Self {
            files: FileService::new(pool.clone(), storage, secrets.clone())
                .with_max_file_size(max_upload_size),
            gate: GateChain::new(pool.clone(), secrets, notifications, gate_config),
            teams: TeamAccessResolver::new(pool.clone()),
            accounts: DownloadAccountDirectory::new(pool.clone()),
            audit: AuditEmitter::new(pool),
            jwt: Arc::new(JwtState::new(
                secret,
                config.security.jwt_access_token_expiry_secs,
            )),
            cookie_key: Key::from(&cookie_key_material(secret)),
            timezone: config.server.timezone.clone(),
            max_upload_size,
            db,
        }
    }

    /// Load the user behind a token, rejecting deleted or disabled accounts.
    pub async fn current_user(&self, claims: &JwtClaims) -> Result<User, ApiError> {
        let user = UserRepository::new(self.db.pool())
            .get_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;

        if !user.is_active {
            return Err(ApiError::forbidden("Account is disabled"));
        }
        Ok(user)
    }

    /// Like [`current_user`](Self::current_user) for optional tokens.
    ///
    /// A token for a missing or disabled user counts as anonymous.
    pub async fn optional_user(&self, claims: Option<&JwtClaims>) -> Result<Option<User>, ApiError> {
        let Some(claims) = claims else {
            return Ok(None);
        };
        let user = UserRepository::new(self.db.pool())
            .get_by_id(claims.sub)
            .await?;
        Ok(user.filter(|u| u.is_active))
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
