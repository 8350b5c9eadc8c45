//! Response DTOs for Web API.

use serde::Serialize;

use crate::account::{AccountDownload, DownloadAccount};
use crate::audit::AuditLogEntry;
use crate::datetime::to_rfc3339;
use crate::db::User;
use crate::download::{DownloadLogEntry, Prompt};
use crate::file::{Availability, FileRecord};
use crate::team::{Team, TeamMember, TeamShare};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    /// Response data.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// Create a new paginated response.
    pub fn new(data: Vec<T>, offset: i64, limit: i64, total: i64) -> Self {
        Self {
            data,
            meta: PaginationMeta {
                offset,
                limit,
                total,
            },
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    /// Rows skipped.
    pub offset: i64,
    /// Page size.
    pub limit: i64,
    /// Total number of matching rows.
    pub total: i64,
}

// ============================================================================
// System users
// ============================================================================

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Access token expiry in seconds.
    pub expires_in: u64,
    /// User information.
    pub user: UserInfo,
}

/// User information in responses.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    /// User ID.
    pub id: i64,
    /// Username.
    pub username: String,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// User role.
    pub role: String,
    /// Account creation timestamp.
    pub created_at: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            created_at: to_rfc3339(user.created_at),
        }
    }
}

// ============================================================================
// Files
// ============================================================================

/// File metadata as shown to owners and team members.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    /// Opaque file ID.
    pub id: String,
    /// Original filename.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    /// Content type.
    pub content_type: String,
    /// Owner user ID.
    pub owner_id: i64,
    /// Upload time.
    pub created_at: String,
    /// Time expiry, absent when unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<String>,
    /// Never expires by time.
    pub unlimited_time: bool,
    /// Downloads left, absent when unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads_remaining: Option<i64>,
    /// Never expires by download count.
    pub unlimited_downloads: bool,
    /// Completed downloads.
    pub download_count: i64,
    /// Whether a password is set.
    pub has_password: bool,
    /// Whether recipients must sign in.
    pub require_auth: bool,
    /// Whether the owner is notified on download.
    pub notify_on_download: bool,
    /// Current availability.
    pub status: &'static str,
    /// Retrieval link path.
    pub download_path: String,
}

impl FileResponse {
    /// Build from a record and its availability at the time of the request.
    pub fn new(file: &FileRecord, availability: Availability) -> Self {
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            size: file.size,
            content_type: file.mime_type(),
            owner_id: file.owner_id,
            created_at: to_rfc3339(file.created_at),
            expire_at: (!file.unlimited_time).then(|| to_rfc3339(file.expire_at)),
            unlimited_time: file.unlimited_time,
            downloads_remaining: (!file.unlimited_downloads).then_some(file.downloads_remaining),
            unlimited_downloads: file.unlimited_downloads,
            download_count: file.download_count,
            has_password: file.has_password(),
            require_auth: file.require_auth,
            notify_on_download: file.notify_on_download,
            status: availability.as_str(),
            download_path: format!("/d/{}", file.id),
        }
    }
}

/// Revealed file password.
#[derive(Debug, Serialize)]
pub struct PasswordResponse {
    /// The password, absent when none is set.
    pub password: Option<String>,
}

/// One download log row.
#[derive(Debug, Serialize)]
pub struct DownloadLogResponse {
    /// Row ID.
    pub id: i64,
    /// Download account, if the recipient was signed in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    /// Client IP.
    pub ip: String,
    /// Client User-Agent.
    pub user_agent: String,
    /// Whether the download was authenticated.
    pub authenticated: bool,
    /// Delivery time.
    pub downloaded_at: String,
}

impl From<DownloadLogEntry> for DownloadLogResponse {
    fn from(entry: DownloadLogEntry) -> Self {
        Self {
            id: entry.id,
            account_id: entry.account_id,
            ip: entry.ip,
            user_agent: entry.user_agent,
            authenticated: entry.authenticated,
            downloaded_at: to_rfc3339(entry.downloaded_at),
        }
    }
}

// ============================================================================
// Retrieval
// ============================================================================

/// Body returned when the gate chain needs credentials.
#[derive(Debug, Serialize)]
pub struct GatePromptResponse {
    /// `password_required` or `login_required`.
    pub status: &'static str,
    /// File being retrieved.
    pub file_id: String,
    /// Inline error from the previous submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatePromptResponse {
    /// Build a prompt body.
    pub fn new(prompt: Prompt, file_id: &str, error: Option<String>) -> Self {
        Self {
            status: prompt.as_str(),
            file_id: file_id.to_string(),
            error,
        }
    }
}

/// Landing information for `/s/{id}`.
#[derive(Debug, Serialize)]
pub struct SplashResponse {
    /// File ID.
    pub id: String,
    /// Original filename.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    /// Availability (always `active` when served).
    pub status: &'static str,
    /// Whether a password will be asked for.
    pub password_required: bool,
    /// Whether a download account will be asked for.
    pub login_required: bool,
    /// Time expiry, absent when unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<String>,
    /// Downloads left, absent when unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads_remaining: Option<i64>,
    /// Retrieval link path.
    pub download_path: String,
}

impl SplashResponse {
    /// Build from an available file.
    pub fn new(file: &FileRecord, availability: Availability) -> Self {
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            size: file.size,
            status: availability.as_str(),
            password_required: file.has_password(),
            login_required: file.require_auth,
            expire_at: (!file.unlimited_time).then(|| to_rfc3339(file.expire_at)),
            downloads_remaining: (!file.unlimited_downloads).then_some(file.downloads_remaining),
            download_path: format!("/d/{}", file.id),
        }
    }
}

// ============================================================================
// Teams
// ============================================================================

/// Team response.
#[derive(Debug, Serialize)]
pub struct TeamResponse {
    /// Team ID.
    pub id: i64,
    /// Team name.
    pub name: String,
    /// Creator user ID.
    pub created_by: i64,
    /// Creation time.
    pub created_at: String,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        Self {
            id: team.id,
            name: team.name,
            created_by: team.created_by,
            created_at: to_rfc3339(team.created_at),
        }
    }
}

/// Team member response.
#[derive(Debug, Serialize)]
pub struct TeamMemberResponse {
    /// User ID.
    pub user_id: i64,
    /// Username.
    pub username: String,
    /// Role in the team.
    pub role: String,
    /// When the member joined.
    pub added_at: String,
}

impl From<TeamMember> for TeamMemberResponse {
    fn from(member: TeamMember) -> Self {
        Self {
            user_id: member.user_id,
            username: member.username,
            role: member.role.as_str().to_string(),
            added_at: to_rfc3339(member.added_at),
        }
    }
}

/// Team share response.
#[derive(Debug, Serialize)]
pub struct TeamShareResponse {
    /// Shared file ID.
    pub file_id: String,
    /// Team ID.
    pub team_id: i64,
    /// Who shared it.
    pub shared_by: i64,
    /// When it was shared.
    pub shared_at: String,
}

impl From<TeamShare> for TeamShareResponse {
    fn from(share: TeamShare) -> Self {
        Self {
            file_id: share.file_id,
            team_id: share.team_id,
            shared_by: share.shared_by,
            shared_at: to_rfc3339(share.shared_at),
        }
    }
}

// ============================================================================
// Download accounts
// ============================================================================

/// Download account dashboard.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub id: i64,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Registration time.
    pub created_at: String,
    /// Last gate use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
    /// Recent downloads, newest first.
    pub downloads: Vec<AccountDownloadResponse>,
}

impl AccountResponse {
    /// Build from an account and its history.
    pub fn new(account: &DownloadAccount, history: Vec<AccountDownload>) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            created_at: to_rfc3339(account.created_at),
            last_used_at: account.last_used_at.map(to_rfc3339),
            downloads: history.into_iter().map(Into::into).collect(),
        }
    }
}

/// One entry of an account's download history.
#[derive(Debug, Serialize)]
pub struct AccountDownloadResponse {
    /// File ID.
    pub file_id: String,
    /// Filename, absent if the file row is gone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Delivery time.
    pub downloaded_at: String,
}

impl From<AccountDownload> for AccountDownloadResponse {
    fn from(download: AccountDownload) -> Self {
        Self {
            file_id: download.file_id,
            file_name: download.file_name,
            downloaded_at: to_rfc3339(download.downloaded_at),
        }
    }
}

// ============================================================================
// Audit log
// ============================================================================

/// Audit log entry response.
#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    /// Entry ID.
    pub id: i64,
    /// Actor ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<i64>,
    /// Actor email or username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_email: Option<String>,
    /// Action name.
    pub action: &'static str,
    /// Entity type.
    pub entity_type: &'static str,
    /// Entity ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Parsed details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Client IP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Client User-Agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Whether the action succeeded.
    pub success: bool,
    /// Why it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When it happened.
    pub created_at: String,
}

impl From<AuditLogEntry> for AuditLogResponse {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            id: entry.id,
            actor_id: entry.actor_id,
            actor_email: entry.actor_email,
            action: entry.action.as_str(),
            entity_type: entry.entity_type.as_str(),
            entity_id: entry.entity_id,
            details: entry
                .details
                .as_deref()
                .and_then(|d| serde_json::from_str(d).ok()),
            ip: entry.ip,
            user_agent: entry.user_agent,
            success: entry.success,
            error_message: entry.error_message,
            created_at: to_rfc3339(entry.created_at),
        }
    }
}
