//! Download account persistence.

use sqlx::SqlitePool;

use super::types::{anonymized_email, AccountDownload, DownloadAccount, ANONYMIZED_NAME};
use crate::datetime::now_unix;
use crate::{DropgateError, Result};

const ACCOUNT_COLUMNS: &str = "id, email, name, password, is_active, created_at, last_used_at";

/// Repository for download accounts.
pub struct DownloadAccountRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DownloadAccountRepository<'a> {
    /// Create a new repository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an account. Fails with `Conflict` if the email is taken.
    pub async fn create(&self, email: &str, name: &str, password_hash: &str) -> Result<DownloadAccount> {
        let sql = format!(
            "INSERT INTO download_accounts (email, name, password, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(email) DO NOTHING
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let account = sqlx::query_as::<_, DownloadAccount>(&sql)
            .bind(email)
            .bind(name)
            .bind(password_hash)
            .bind(now_unix())
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;

        account.ok_or_else(|| DropgateError::Conflict("email is already registered".to_string()))
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<DownloadAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM download_accounts WHERE id = ?");
        let account = sqlx::query_as::<_, DownloadAccount>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;
        Ok(account)
    }

    /// Get an account by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<DownloadAccount>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM download_accounts WHERE email = ? COLLATE NOCASE"
        );
        let account = sqlx::query_as::<_, DownloadAccount>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;
        Ok(account)
    }

    /// Record a successful sign-in.
    pub async fn touch_last_used(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE download_accounts SET last_used_at = ? WHERE id = ?")
            .bind(now_unix())
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;
        Ok(())
    }

    /// Scrub personal data and deactivate. Returns `false` if the account does not exist.
    ///
    /// `unusable_password` replaces the hash so the old password stops working
    /// even if the account were reactivated.
    pub async fn anonymize(&self, id: i64, unusable_password: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE download_accounts
             SET name = ?, email = ?, password = ?, is_active = 0
             WHERE id = ?",
        )
        .bind(ANONYMIZED_NAME)
        .bind(anonymized_email(id))
        .bind(unusable_password)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| DropgateError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Download history of an account, newest first.
    pub async fn download_history(&self, id: i64, limit: i64) -> Result<Vec<AccountDownload>> {
        let rows = sqlx::query_as::<_, AccountDownload>(
            "SELECT l.file_id, f.name AS file_name, l.downloaded_at
             FROM download_logs l
             LEFT JOIN files f ON f.id = l.file_id
             WHERE l.account_id = ?
             ORDER BY l.downloaded_at DESC, l.id DESC
             LIMIT ?",
        )
        .bind(id)
        .bind(limit)
        .fetch_all(self.pool)
        .await
        .map_err(|e| DropgateError::Database(e.to_string()))?;
        Ok(rows)
    }
}
