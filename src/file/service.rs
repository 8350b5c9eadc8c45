//! File service for Dropgate.
//!
//! This module provides the owner-side file operations:
//! - Upload with size and settings validation
//! - Listing and lookup with team-aware access control
//! - Editing expiration settings, revealing and trashing

use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::record::{FileRecord, FileSettings, NewFileRecord};
use super::repository::{generate_file_id, FileRepository};
use super::storage::FileStorage;
use super::{DEFAULT_MAX_FILE_SIZE, MAX_FILENAME_LENGTH};
use crate::audit::{AuditAction, AuditEmitter, ClientInfo, EntityType, NewAuditEntry};
use crate::auth::SecretBox;
use crate::datetime::now_unix;
use crate::db::User;
use crate::team::TeamAccessResolver;
use crate::{DropgateError, Result};

/// Request data for file upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Original filename.
    pub filename: String,
    /// Declared content type.
    pub content_type: Option<String>,
    /// File content.
    pub content: Vec<u8>,
    /// Expiration and access settings. The password is plaintext here.
    pub settings: FileSettings,
}

impl UploadRequest {
    /// Create a new upload request with default settings.
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            content,
            settings: FileSettings::default(),
        }
    }

    /// Set the settings.
    pub fn with_settings(mut self, settings: FileSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Reject settings that would make a file unavailable from the start.
pub fn validate_settings(settings: &FileSettings, now: i64) -> Result<()> {
    if !settings.unlimited_time && settings.expire_at <= now {
        return Err(DropgateError::Validation(
            "expiry must be in the future".to_string(),
        ));
    }
    if !settings.unlimited_downloads && settings.downloads < 1 {
        return Err(DropgateError::Validation(
            "downloads must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn settings_details(settings: &FileSettings, password_set: Option<bool>) -> serde_json::Value {
    json!({
        "expire_at": settings.expire_at,
        "unlimited_time": settings.unlimited_time,
        "downloads": settings.downloads,
        "unlimited_downloads": settings.unlimited_downloads,
        "require_auth": settings.require_auth,
        "notify_on_download": settings.notify_on_download,
        "password_set": password_set,
    })
}

/// File service for managing uploads and owner actions.
#[derive(Debug, Clone)]
pub struct FileService {
    pool: SqlitePool,
    storage: FileStorage,
    secrets: SecretBox,
    teams: TeamAccessResolver,
    audit: AuditEmitter,
    max_file_size: u64,
}

impl FileService {
    /// Create a new FileService.
    pub fn new(pool: SqlitePool, storage: FileStorage, secrets: SecretBox) -> Self {
        Self {
            teams: TeamAccessResolver::new(pool.clone()),
            audit: AuditEmitter::new(pool.clone()),
            pool,
            storage,
            secrets,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Create a new FileService with a custom max file size.
    pub fn with_max_file_size(mut self, max_size: u64) -> Self {
        self.max_file_size = max_size;
        self
    }

    /// Blob storage.
    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    fn repo(&self) -> FileRepository<'_> {
        FileRepository::new(&self.pool)
    }

    fn entry(&self, action: AuditAction, file_id: &str, user: &User, client: &ClientInfo) -> NewAuditEntry {
        NewAuditEntry::new(action, EntityType::File)
            .entity(file_id)
            .actor(Some(user.id), Some(&user.username))
            .client(client)
    }

    /// Upload a file.
    ///
    /// # Validation
    /// - Filename: non-empty, max 255 characters
    /// - File size: max configured size
    /// - Settings: see [`validate_settings`]
    pub async fn upload(
        &self,
        request: &UploadRequest,
        user: &User,
        client: &ClientInfo,
    ) -> Result<FileRecord> {
        let filename = request.filename.trim();
        if filename.is_empty() {
            return Err(DropgateError::Validation("filename is required".to_string()));
        }
        if filename.chars().count() > MAX_FILENAME_LENGTH {
            return Err(DropgateError::Validation(format!(
                "filename must be at most {MAX_FILENAME_LENGTH} characters"
            )));
        }
        if request.content.len() as u64 > self.max_file_size {
            let max_mb = self.max_file_size / 1024 / 1024;
            return Err(DropgateError::Validation(format!(
                "file is too large (max {max_mb}MB)"
            )));
        }
        validate_settings(&request.settings, now_unix())?;

        let mut settings = request.settings.clone();
        settings.password = match settings.password.as_deref().filter(|p| !p.is_empty()) {
            Some(plain) => Some(self.secrets.seal(plain)?),
            None => None,
        };

        let stored_name = self.storage.save(&request.content, filename).await?;
        let new_file = NewFileRecord {
            id: generate_file_id(),
            name: filename.to_string(),
            stored_name: stored_name.clone(),
            size: request.content.len() as i64,
            content_type: request.content_type.clone().filter(|ct| !ct.is_empty()),
            owner_id: user.id,
            settings,
        };

        let file = match self.repo().create(&new_file).await {
            Ok(file) => file,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&stored_name).await {
                    warn!(%stored_name, error = %cleanup, "Failed to remove orphaned blob");
                }
                return Err(e);
            }
        };

        self.audit
            .record(
                self.entry(AuditAction::FileUpload, &file.id, user, client)
                    .details(json!({ "name": file.name, "size": file.size })),
            )
            .await;
        info!(file_id = %file.id, owner_id = user.id, size = file.size, "File uploaded");
        Ok(file)
    }

    /// Get a file the user may access.
    pub async fn get(&self, file_id: &str, user: &User) -> Result<FileRecord> {
        let file = self
            .repo()
            .get(file_id)
            .await?
            .ok_or_else(|| DropgateError::NotFound("file".to_string()))?;
        if !user.is_admin() && !self.teams.can_access(file_id, user.id).await? {
            return Err(DropgateError::Permission(
                "no access to this file".to_string(),
            ));
        }
        Ok(file)
    }

    /// Files owned by the user.
    pub async fn list_own(&self, user: &User) -> Result<Vec<FileRecord>> {
        self.repo().list_by_owner(user.id).await
    }

    async fn require_manage(
        &self,
        action: AuditAction,
        file_id: &str,
        user: &User,
        client: &ClientInfo,
    ) -> Result<FileRecord> {
        let file = self
            .repo()
            .get(file_id)
            .await?
            .ok_or_else(|| DropgateError::NotFound("file".to_string()))?;
        if !self.teams.can_manage_file(file_id, user.id).await? {
            self.audit
                .record(self.entry(action, file_id, user, client).failed("permission denied"))
                .await;
            return Err(DropgateError::Permission(
                "only the file owner can do this".to_string(),
            ));
        }
        Ok(file)
    }

    /// Replace a file's expiration and access settings.
    ///
    /// This is the only way to raise the remaining download count.
    /// `settings.password` is ignored; `password` follows the
    /// `Option<Option<_>>` convention (`None` keeps, `Some(None)` clears).
    pub async fn edit_settings(
        &self,
        file_id: &str,
        user: &User,
        settings: &FileSettings,
        password: Option<Option<String>>,
        client: &ClientInfo,
    ) -> Result<FileRecord> {
        self.require_manage(AuditAction::FileSettingsUpdate, file_id, user, client)
            .await?;
        validate_settings(settings, now_unix())?;

        let sealed = match password {
            Some(Some(plain)) if !plain.is_empty() => Some(Some(self.secrets.seal(&plain)?)),
            Some(_) => Some(None),
            None => None,
        };
        let password_set = sealed.as_ref().map(Option::is_some);

        let file = self
            .repo()
            .update_settings(file_id, settings, sealed)
            .await?
            .ok_or_else(|| DropgateError::NotFound("file".to_string()))?;

        self.audit
            .record(
                self.entry(AuditAction::FileSettingsUpdate, file_id, user, client)
                    .details(settings_details(settings, password_set)),
            )
            .await;
        info!(file_id, user_id = user.id, "File settings updated");
        Ok(file)
    }

    /// Decrypt the file password for its owner.
    pub async fn reveal_password(
        &self,
        file_id: &str,
        user: &User,
        client: &ClientInfo,
    ) -> Result<Option<String>> {
        let file = self
            .require_manage(AuditAction::FilePasswordReveal, file_id, user, client)
            .await?;
        let password = match file.password.as_deref().filter(|p| !p.is_empty()) {
            Some(sealed) => Some(self.secrets.open(sealed)?),
            None => None,
        };
        self.audit
            .record(self.entry(AuditAction::FilePasswordReveal, file_id, user, client))
            .await;
        Ok(password)
    }

    /// Move a file to the trash. Its links stop working immediately.
    pub async fn trash(&self, file_id: &str, user: &User, client: &ClientInfo) -> Result<()> {
        self.require_manage(AuditAction::FileDelete, file_id, user, client)
            .await?;
        if !self.repo().soft_delete(file_id).await? {
            return Err(DropgateError::NotFound("file".to_string()));
        }
        self.audit
            .record(self.entry(AuditAction::FileDelete, file_id, user, client))
            .await;
        info!(file_id, user_id = user.id, "File moved to trash");
        Ok(())
    }
}
