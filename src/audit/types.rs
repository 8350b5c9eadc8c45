//! Audit log types.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "&'static str")]
pub enum AuditAction {
    /// System user signed in to the management API.
    UserLogin,
    /// File uploaded.
    FileUpload,
    /// A retrieval request was answered (delivered or refused).
    FileDownload,
    /// File password submitted or checked on a download link.
    FilePasswordCheck,
    /// File expiration/access settings edited.
    FileSettingsUpdate,
    /// Owner revealed the stored file password.
    FilePasswordReveal,
    /// File moved to the trash.
    FileDelete,
    /// Download account registered through a download link.
    AccountCreate,
    /// Download account signed in through a download link.
    AccountLogin,
    /// Download account anonymized itself.
    AccountAnonymize,
    /// Team created.
    TeamCreate,
    /// Team member added.
    TeamMemberAdd,
    /// Team member removed.
    TeamMemberRemove,
    /// File shared to a team.
    TeamFileShare,
    /// File removed from a team.
    TeamFileUnshare,
    /// Audit log exported.
    AuditExport,
}

impl AuditAction {
    /// All actions, in display order.
    pub const ALL: [AuditAction; 16] = [
        AuditAction::UserLogin,
        AuditAction::FileUpload,
        AuditAction::FileDownload,
        AuditAction::FilePasswordCheck,
        AuditAction::FileSettingsUpdate,
        AuditAction::FilePasswordReveal,
        AuditAction::FileDelete,
        AuditAction::AccountCreate,
        AuditAction::AccountLogin,
        AuditAction::AccountAnonymize,
        AuditAction::TeamCreate,
        AuditAction::TeamMemberAdd,
        AuditAction::TeamMemberRemove,
        AuditAction::TeamFileShare,
        AuditAction::TeamFileUnshare,
        AuditAction::AuditExport,
    ];

    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserLogin => "user.login",
            AuditAction::FileUpload => "file.upload",
            AuditAction::FileDownload => "file.download",
            AuditAction::FilePasswordCheck => "file.password_check",
            AuditAction::FileSettingsUpdate => "file.settings_update",
            AuditAction::FilePasswordReveal => "file.password_reveal",
            AuditAction::FileDelete => "file.delete",
            AuditAction::AccountCreate => "account.create",
            AuditAction::AccountLogin => "account.login",
            AuditAction::AccountAnonymize => "account.anonymize",
            AuditAction::TeamCreate => "team.create",
            AuditAction::TeamMemberAdd => "team.member_add",
            AuditAction::TeamMemberRemove => "team.member_remove",
            AuditAction::TeamFileShare => "team.file_share",
            AuditAction::TeamFileUnshare => "team.file_unshare",
            AuditAction::AuditExport => "audit.export",
        }
    }
}

impl From<AuditAction> for &'static str {
    fn from(action: AuditAction) -> Self {
        action.as_str()
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown audit action: {s}"))
    }
}

impl TryFrom<String> for AuditAction {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Kind of entity an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A shared file.
    File,
    /// A team.
    Team,
    /// A system user.
    User,
    /// A download account.
    DownloadAccount,
    /// The audit log itself.
    AuditLog,
}

impl EntityType {
    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::File => "file",
            EntityType::Team => "team",
            EntityType::User => "user",
            EntityType::DownloadAccount => "download_account",
            EntityType::AuditLog => "audit_log",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(EntityType::File),
            "team" => Ok(EntityType::Team),
            "user" => Ok(EntityType::User),
            "download_account" => Ok(EntityType::DownloadAccount),
            "audit_log" => Ok(EntityType::AuditLog),
            _ => Err(format!("unknown entity type: {s}")),
        }
    }
}

impl TryFrom<String> for EntityType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Client address and agent of the request that caused an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client IP address.
    pub ip: String,
    /// User-Agent header.
    pub user_agent: String,
}

impl ClientInfo {
    /// Build from raw values.
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditLogEntry {
    /// Entry ID.
    pub id: i64,
    /// System user or download account ID, if known.
    pub actor_id: Option<i64>,
    /// Actor email or username, if known.
    pub actor_email: Option<String>,
    /// What happened.
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    /// Kind of entity.
    #[sqlx(try_from = "String")]
    pub entity_type: EntityType,
    /// Entity ID.
    pub entity_id: Option<String>,
    /// Free-form details (JSON).
    pub details: Option<String>,
    /// Client IP.
    pub ip: Option<String>,
    /// Client User-Agent.
    pub user_agent: Option<String>,
    /// When it happened (unix seconds).
    pub created_at: i64,
    /// Whether the action succeeded.
    pub success: bool,
    /// Why it failed.
    pub error_message: Option<String>,
}

/// An audit entry to record.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    /// Actor ID.
    pub actor_id: Option<i64>,
    /// Actor email or username.
    pub actor_email: Option<String>,
    /// What happened.
    pub action: AuditAction,
    /// Kind of entity.
    pub entity_type: EntityType,
    /// Entity ID.
    pub entity_id: Option<String>,
    /// Free-form details.
    pub details: Option<serde_json::Value>,
    /// Client information.
    pub client: ClientInfo,
    /// Whether the action succeeded.
    pub success: bool,
    /// Why it failed.
    pub error_message: Option<String>,
}

impl NewAuditEntry {
    /// Start a successful entry.
    pub fn new(action: AuditAction, entity_type: EntityType) -> Self {
        Self {
            actor_id: None,
            actor_email: None,
            action,
            entity_type,
            entity_id: None,
            details: None,
            client: ClientInfo::default(),
            success: true,
            error_message: None,
        }
    }

    /// Set the entity ID.
    pub fn entity(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Set the actor.
    pub fn actor(mut self, id: Option<i64>, email: Option<&str>) -> Self {
        self.actor_id = id;
        self.actor_email = email.map(str::to_string);
        self
    }

    /// Set the client information.
    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.client = client.clone();
        self
    }

    /// Attach details.
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark the entry as a failure.
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_are_unique_and_parse_back() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        let mut names: Vec<_> = AuditAction::ALL.iter().map(|a| a.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), AuditAction::ALL.len());
        assert!("file.explode".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!(
            "download_account".parse::<EntityType>().unwrap(),
            EntityType::DownloadAccount
        );
        assert!("folder".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_builder() {
        let client = ClientInfo::new("10.0.0.1", "curl/8");
        let entry = NewAuditEntry::new(AuditAction::FileDownload, EntityType::File)
            .entity("abc")
            .actor(Some(3), Some("jane@example.com"))
            .client(&client)
            .details(serde_json::json!({"gate": "password"}))
            .failed("Incorrect password");

        assert_eq!(entry.entity_id.as_deref(), Some("abc"));
        assert_eq!(entry.actor_id, Some(3));
        assert_eq!(entry.client, client);
        assert!(!entry.success);
        assert_eq!(entry.error_message.as_deref(), Some("Incorrect password"));
    }

    #[test]
    fn test_action_serializes_as_name() {
        let json = serde_json::to_string(&AuditAction::TeamFileShare).unwrap();
        assert_eq!(json, "\"team.file_share\"");
    }
}
