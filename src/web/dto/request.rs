//! Request DTOs for the HTTP surface.

use serde::Deserialize;
use validator::Validate;

use crate::audit::{AuditAction, AuditQuery, EntityType, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::datetime::parse_rfc3339;
use crate::download::CredentialSubmission;
use crate::file::FileSettings;
use crate::team::TeamRole;
use crate::web::error::ApiError;

use super::validation::{no_control_chars, not_empty_trimmed, sanitize_string};

/// Login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username.
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,
    /// Password.
    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
}

/// Replacement settings for `PUT /api/files/{id}/settings`.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    /// Absolute expiry (unix seconds). Ignored when `unlimited_time` is set.
    #[serde(default)]
    pub expire_at: i64,
    /// Never expire by time.
    #[serde(default)]
    pub unlimited_time: bool,
    /// Allowed downloads from now on.
    #[serde(default)]
    #[validate(range(min = 0, message = "Downloads must not be negative"))]
    pub downloads: i64,
    /// Never expire by download count.
    #[serde(default)]
    pub unlimited_downloads: bool,
    /// New password. Absent keeps the current one, empty clears it.
    #[serde(default)]
    #[validate(length(max = 128, message = "Password must be at most 128 characters"))]
    pub password: Option<String>,
    /// Recipients must sign in with a download account.
    #[serde(default)]
    pub require_auth: bool,
    /// Notify the owner on each download.
    #[serde(default)]
    pub notify_on_download: bool,
}

impl UpdateSettingsRequest {
    /// Split into settings and the password update.
    pub fn into_parts(self) -> (FileSettings, Option<Option<String>>) {
        let password = self.password.map(|p| Some(p).filter(|p| !p.is_empty()));
        let settings = FileSettings {
            expire_at: self.expire_at,
            unlimited_time: self.unlimited_time,
            downloads: self.downloads,
            unlimited_downloads: self.unlimited_downloads,
            password: None,
            require_auth: self.require_auth,
            notify_on_download: self.notify_on_download,
        };
        (settings, password)
    }
}

/// Create team request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    /// Team name.
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub name: String,
}

/// Add team member request.
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    /// User to add.
    pub user_id: i64,
    /// Role in the team.
    #[serde(default = "default_team_role")]
    pub role: TeamRole,
}

fn default_team_role() -> TeamRole {
    TeamRole::Member
}

/// Share file with team request.
#[derive(Debug, Deserialize, Validate)]
pub struct ShareFileRequest {
    /// File to share.
    #[validate(length(min = 1, max = 64, message = "File ID is required"))]
    pub file_id: String,
}

/// Form fields accepted by `POST /d/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct UnlockForm {
    /// File password.
    #[serde(default)]
    pub password: Option<String>,
    /// Download account email.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name, required to register.
    #[serde(default)]
    pub name: Option<String>,
    /// Download account password.
    #[serde(default)]
    pub account_password: Option<String>,
}

impl From<UnlockForm> for CredentialSubmission {
    fn from(form: UnlockForm) -> Self {
        CredentialSubmission {
            password: form.password,
            email: form.email,
            name: form.name.map(|n| sanitize_string(&n).trim().to_string()),
            account_password: form.account_password,
        }
    }
}

/// Query parameters of `/d/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    /// `1` or `true` lets the global session stand in for a per-file one.
    #[serde(default)]
    pub direct: Option<String>,
}

impl DownloadQuery {
    /// Whether the direct-stream variant was requested.
    pub fn is_direct(&self) -> bool {
        matches!(self.direct.as_deref(), Some("1" | "true"))
    }
}

/// Query parameters of the audit log endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    /// Actor ID.
    pub actor_id: Option<i64>,
    /// Action name, e.g. `file.download`.
    pub action: Option<String>,
    /// Entity type, e.g. `file`.
    pub entity_type: Option<String>,
    /// Entity ID.
    pub entity_id: Option<String>,
    /// Lower bound, RFC 3339.
    pub from: Option<String>,
    /// Upper bound, RFC 3339.
    pub to: Option<String>,
    /// Only successes or failures.
    pub success: Option<bool>,
    /// Free-text search.
    pub search: Option<String>,
    /// Rows to skip.
    pub offset: Option<i64>,
    /// Rows to return.
    pub limit: Option<i64>,
}

impl AuditLogQuery {
    /// Convert into a repository query.
    ///
    /// `paginate` selects between a page (list) and everything (export).
    pub fn into_query(self, paginate: bool) -> Result<AuditQuery, ApiError> {
        let action = self
            .action
            .filter(|a| !a.is_empty())
            .map(|a| a.parse::<AuditAction>())
            .transpose()
            .map_err(ApiError::bad_request)?;
        let entity_type = self
            .entity_type
            .filter(|e| !e.is_empty())
            .map(|e| e.parse::<EntityType>())
            .transpose()
            .map_err(ApiError::bad_request)?;
        let bound = |value: Option<String>, name: &str| -> Result<Option<i64>, ApiError> {
            match value.filter(|v| !v.is_empty()) {
                Some(v) => parse_rfc3339(&v)
                    .map(Some)
                    .ok_or_else(|| ApiError::bad_request(format!("Invalid {name} timestamp"))),
                None => Ok(None),
            }
        };

        let (offset, limit) = if paginate {
            (
                self.offset.unwrap_or(0).max(0),
                self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            )
        } else {
            (0, 0)
        };

        Ok(AuditQuery {
            actor_id: self.actor_id,
            action,
            entity_type,
            entity_id: self.entity_id.filter(|e| !e.is_empty()),
            from: bound(self.from, "from")?,
            to: bound(self.to, "to")?,
            success: self.success,
            search: self.search.filter(|s| !s.trim().is_empty()),
            offset,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_password_update() {
        let base = || UpdateSettingsRequest {
            expire_at: 0,
            unlimited_time: true,
            downloads: 3,
            unlimited_downloads: false,
            password: None,
            require_auth: false,
            notify_on_download: false,
        };

        let (settings, password) = base().into_parts();
        assert_eq!(settings.downloads, 3);
        assert_eq!(password, None);

        let (_, password) = UpdateSettingsRequest {
            password: Some(String::new()),
            ..base()
        }
        .into_parts();
        assert_eq!(password, Some(None));

        let (settings, password) = UpdateSettingsRequest {
            password: Some("hunter22".to_string()),
            ..base()
        }
        .into_parts();
        assert_eq!(password, Some(Some("hunter22".to_string())));
        assert!(settings.password.is_none());
    }

    #[test]
    fn test_download_query_direct() {
        assert!(!DownloadQuery::default().is_direct());
        assert!(DownloadQuery {
            direct: Some("1".to_string())
        }
        .is_direct());
        assert!(!DownloadQuery {
            direct: Some("0".to_string())
        }
        .is_direct());
    }

    #[test]
    fn test_audit_query_conversion() {
        let query = AuditLogQuery {
            action: Some("file.download".to_string()),
            from: Some("2024-01-15T00:00:00Z".to_string()),
            limit: Some(10_000),
            ..Default::default()
        }
        .into_query(true)
        .unwrap();
        assert_eq!(query.action, Some(AuditAction::FileDownload));
        assert_eq!(query.from, Some(1_705_276_800));
        assert_eq!(query.limit, MAX_PAGE_SIZE);

        let export = AuditLogQuery::default().into_query(false).unwrap();
        assert_eq!(export.limit, 0);

        assert!(AuditLogQuery {
            action: Some("nope".to_string()),
            ..Default::default()
        }
        .into_query(true)
        .is_err());
        assert!(AuditLogQuery {
            to: Some("yesterday".to_string()),
            ..Default::default()
        }
        .into_query(true)
        .is_err());
    }
}
