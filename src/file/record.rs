//! File record types.

use serde::Serialize;

/// Metadata for one uploaded artifact, including its expiration and quota state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRecord {
    /// Opaque link id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stored blob name (UUID.ext format).
    pub stored_name: String,
    /// Size in bytes.
    pub size: i64,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Owning system user.
    pub owner_id: i64,
    /// Upload time (unix seconds).
    pub created_at: i64,
    /// Absolute expiry (unix seconds). Zero means no expiry set.
    pub expire_at: i64,
    /// Ignore `expire_at`.
    pub unlimited_time: bool,
    /// Remaining downloads when the quota is limited.
    pub downloads_remaining: i64,
    /// Ignore `downloads_remaining`.
    pub unlimited_downloads: bool,
    /// Successful deliveries so far. Never reset.
    pub download_count: i64,
    /// Encrypted file password, if one is set.
    pub password: Option<String>,
    /// Recipients must sign in with a download account.
    pub require_auth: bool,
    /// Notify the owner on each download.
    pub notify_on_download: bool,
    /// Set when the file is in the trash.
    pub deleted_at: Option<i64>,
}

impl FileRecord {
    /// Whether a file password is configured.
    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Whether the file has been moved to the trash.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Content type to serve, guessed from the name when none was declared.
    pub fn mime_type(&self) -> String {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() => ct.to_string(),
            _ => mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .to_string(),
        }
    }
}

/// Expiration and access settings chosen at upload time and by "edit settings".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSettings {
    /// Absolute expiry (unix seconds). Zero means none.
    pub expire_at: i64,
    /// Never expire by time.
    pub unlimited_time: bool,
    /// Allowed downloads.
    pub downloads: i64,
    /// Never expire by download count.
    pub unlimited_downloads: bool,
    /// Plaintext password. `None` or empty means no password.
    #[serde(skip)]
    pub password: Option<String>,
    /// Recipients must sign in with a download account.
    pub require_auth: bool,
    /// Notify the owner on each download.
    pub notify_on_download: bool,
}

/// Data for inserting a new file record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    /// Opaque link id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stored blob name.
    pub stored_name: String,
    /// Size in bytes.
    pub size: i64,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Owning system user.
    pub owner_id: i64,
    /// Settings; the password must already be sealed.
    pub settings: FileSettings,
}
