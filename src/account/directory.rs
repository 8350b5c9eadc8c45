//! Download account directory.
//!
//! Creates, authenticates and anonymizes the accounts recipients use to pass a
//! file's authentication gate. Entirely separate from system users.

use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::repository::DownloadAccountRepository;
use super::types::{AccountDownload, DownloadAccount};
use crate::auth::validation::{normalize_email, validate_email, validate_name};
use crate::auth::{hash_password, verify_password};
use crate::{DropgateError, Result};

/// Directory of download accounts.
#[derive(Debug, Clone)]
pub struct DownloadAccountDirectory {
    pool: SqlitePool,
}

impl DownloadAccountDirectory {
    /// Create a directory backed by the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> DownloadAccountRepository<'_> {
        DownloadAccountRepository::new(&self.pool)
    }

    /// Register a new account.
    ///
    /// Fails with `Conflict` if the email is already registered, including by
    /// an inactive account.
    pub async fn create_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<DownloadAccount> {
        let name = name.trim();
        let email = normalize_email(email);
        validate_name(name).map_err(|e| DropgateError::Validation(e.to_string()))?;
        validate_email(&email).map_err(|e| DropgateError::Validation(e.to_string()))?;

        let hash = hash_password(password)?;
        let account = self.repo().create(&email, name, &hash).await?;
        info!(account_id = account.id, "Download account created");
        Ok(account)
    }

    /// Check an email/password pair.
    ///
    /// Unknown emails, inactive accounts and wrong passwords all fail with
    /// `InvalidCredentials`. Success updates `last_used_at`.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<DownloadAccount> {
        let email = normalize_email(email);
        let repo = self.repo();

        let account = repo
            .get_by_email(&email)
            .await?
            .filter(|a| a.is_active)
            .ok_or(DropgateError::InvalidCredentials)?;

        verify_password(password, &account.password)
            .map_err(|_| DropgateError::InvalidCredentials)?;

        repo.touch_last_used(account.id).await?;
        repo.get_by_id(account.id)
            .await?
            .ok_or(DropgateError::InvalidCredentials)
    }

    /// Look up an active account by email.
    pub async fn find_active_by_email(&self, email: &str) -> Result<Option<DownloadAccount>> {
        let email = normalize_email(email);
        Ok(self.repo().get_by_email(&email).await?.filter(|a| a.is_active))
    }

    /// Whether any account, active or not, holds this email.
    pub async fn email_registered(&self, email: &str) -> Result<bool> {
        let email = normalize_email(email);
        Ok(self.repo().get_by_email(&email).await?.is_some())
    }

    /// Get an account by ID.
    pub async fn get(&self, id: i64) -> Result<Option<DownloadAccount>> {
        self.repo().get_by_id(id).await
    }

    /// Download history of an account.
    pub async fn download_history(&self, id: i64, limit: i64) -> Result<Vec<AccountDownload>> {
        self.repo().download_history(id, limit).await
    }

    /// Scrub name and email, disable sign-in and deactivate.
    ///
    /// Download log rows are left alone; they keep pointing at the same id.
    pub async fn anonymize(&self, account_id: i64) -> Result<()> {
        let unusable = format!("!disabled-{}", Uuid::new_v4());
        if !self.repo().anonymize(account_id, &unusable).await? {
            return Err(DropgateError::NotFound("download account".to_string()));
        }
        info!(account_id, "Download account anonymized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::types::{anonymized_email, ANONYMIZED_NAME};
    use crate::Database;

    async fn setup() -> (Database, DownloadAccountDirectory) {
        let db = Database::open_in_memory().await.unwrap();
        let dir = DownloadAccountDirectory::new(db.pool().clone());
        (db, dir)
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let (_db, dir) = setup().await;

        let created = dir
            .create_account("Jane Doe", " Jane@Example.com ", "correct horse")
            .await
            .unwrap();
        assert_eq!(created.email, "jane@example.com");
        assert_ne!(created.password, "correct horse");

        let account = dir
            .authenticate("jane@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(account.id, created.id);
        assert!(account.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let (_db, dir) = setup().await;

        dir.create_account("Jane", "jane@example.com", "password1")
            .await
            .unwrap();
        assert!(matches!(
            dir.create_account("Jane 2", "JANE@example.com", "password2")
                .await,
            Err(DropgateError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_db, dir) = setup().await;

        assert!(matches!(
            dir.create_account("", "jane@example.com", "password1").await,
            Err(DropgateError::Validation(_))
        ));
        assert!(matches!(
            dir.create_account("Jane", "not-an-email", "password1").await,
            Err(DropgateError::Validation(_))
        ));
        assert!(matches!(
            dir.create_account("Jane", "jane@example.com", "short").await,
            Err(DropgateError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_failures() {
        let (_db, dir) = setup().await;
        dir.create_account("Jane", "jane@example.com", "password1")
            .await
            .unwrap();

        assert!(matches!(
            dir.authenticate("jane@example.com", "wrong-password").await,
            Err(DropgateError::InvalidCredentials)
        ));
        assert!(matches!(
            dir.authenticate("nobody@example.com", "password1").await,
            Err(DropgateError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_anonymize_keeps_logs() {
        let (db, dir) = setup().await;
        let account = dir
            .create_account("Jane", "jane@example.com", "password1")
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO download_logs (file_id, account_id, ip, user_agent, downloaded_at, authenticated)
             VALUES ('f1', ?, '127.0.0.1', 'test', 1, 1)",
        )
        .bind(account.id)
        .execute(db.pool())
        .await
        .unwrap();

        dir.anonymize(account.id).await.unwrap();

        let scrubbed = dir.get(account.id).await.unwrap().unwrap();
        assert_eq!(scrubbed.name, ANONYMIZED_NAME);
        assert_eq!(scrubbed.email, anonymized_email(account.id));
        assert!(!scrubbed.is_active);

        assert!(matches!(
            dir.authenticate("jane@example.com", "password1").await,
            Err(DropgateError::InvalidCredentials)
        ));
        assert!(dir
            .find_active_by_email("jane@example.com")
            .await
            .unwrap()
            .is_none());

        let history = dir.download_history(account.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].file_id, "f1");
        assert!(history[0].file_name.is_none());

        // The original email is free again.
        dir.create_account("Jane", "jane@example.com", "password1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_anonymize_unknown() {
        let (_db, dir) = setup().await;
        assert!(matches!(
            dir.anonymize(42).await,
            Err(DropgateError::NotFound(_))
        ));
    }
}
