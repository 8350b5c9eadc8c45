//! Download account types.

use serde::Serialize;

/// Display name written over an anonymized account.
pub const ANONYMIZED_NAME: &str = "Deleted account";

/// An end-user identity used only to satisfy a file's authentication gate.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DownloadAccount {
    /// Account ID. Stable across anonymization.
    pub id: i64,
    /// Email address, used as the session key.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Password hash (Argon2).
    #[serde(skip)]
    pub password: String,
    /// False once anonymized.
    pub is_active: bool,
    /// Creation time (unix seconds).
    pub created_at: i64,
    /// Last successful sign-in (unix seconds).
    pub last_used_at: Option<i64>,
}

/// One row of an account's download history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AccountDownload {
    /// Downloaded file ID.
    pub file_id: String,
    /// File name, if the file still exists.
    pub file_name: Option<String>,
    /// Download time (unix seconds).
    pub downloaded_at: i64,
}

/// Placeholder email for an anonymized account.
pub fn anonymized_email(account_id: i64) -> String {
    format!("deleted-{account_id}@anonymized.invalid")
}
