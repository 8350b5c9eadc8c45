//! File record repository.

use rand::distr::Alphanumeric;
use rand::Rng;
use sqlx::SqlitePool;

use super::record::{FileRecord, FileSettings, NewFileRecord};
use crate::datetime::now_unix;
use crate::{DropgateError, Result};

/// Length of generated link ids.
pub const FILE_ID_LENGTH: usize = 16;

const FILE_COLUMNS: &str = "id, name, stored_name, size, content_type, owner_id, created_at, \
     expire_at, unlimited_time, downloads_remaining, unlimited_downloads, download_count, \
     password, require_auth, notify_on_download, deleted_at";

/// Generate a random opaque link id.
pub fn generate_file_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(FILE_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Repository for file records.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new file record.
    pub async fn create(&self, new_file: &NewFileRecord) -> Result<FileRecord> {
        let s = &new_file.settings;
        sqlx::query(
            "INSERT INTO files (id, name, stored_name, size, content_type, owner_id, created_at,
                                expire_at, unlimited_time, downloads_remaining, unlimited_downloads,
                                password, require_auth, notify_on_download)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_file.id)
        .bind(&new_file.name)
        .bind(&new_file.stored_name)
        .bind(new_file.size)
        .bind(&new_file.content_type)
        .bind(new_file.owner_id)
        .bind(now_unix())
        .bind(s.expire_at)
        .bind(s.unlimited_time)
        .bind(s.downloads.max(0))
        .bind(s.unlimited_downloads)
        .bind(s.password.as_deref().filter(|p| !p.is_empty()))
        .bind(s.require_auth)
        .bind(s.notify_on_download)
        .execute(self.pool)
        .await
        .map_err(|e| DropgateError::Database(e.to_string()))?;

        self.get(&new_file.id)
            .await?
            .ok_or_else(|| DropgateError::NotFound("file".to_string()))
    }

    /// Get a file that is not in the trash.
    pub async fn get(&self, id: &str) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ? AND deleted_at IS NULL");
        let result = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(result)
    }

    /// List files owned by a user, newest first.
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND deleted_at IS NULL
             ORDER BY created_at DESC, id"
        );
        let files = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(owner_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(files)
    }

    /// List files shared to a team.
    pub async fn list_by_team(&self, team_id: i64) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE deleted_at IS NULL
               AND id IN (SELECT file_id FROM team_files WHERE team_id = ?)
             ORDER BY created_at DESC, id"
        );
        let files = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(team_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(files)
    }

    /// Replace the expiration and access settings of a file.
    ///
    /// This is the only path that may raise `downloads_remaining`.
    /// `password` follows the `Option<Option<_>>` update convention: `None`
    /// keeps the stored value, `Some(None)` clears it.
    pub async fn update_settings(
        &self,
        id: &str,
        settings: &FileSettings,
        password: Option<Option<String>>,
    ) -> Result<Option<FileRecord>> {
        let mut query: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new("UPDATE files SET ");
        let mut separated = query.separated(", ");

        separated.push("expire_at = ");
        separated.push_bind_unseparated(settings.expire_at);
        separated.push("unlimited_time = ");
        separated.push_bind_unseparated(settings.unlimited_time);
        separated.push("downloads_remaining = ");
        separated.push_bind_unseparated(settings.downloads.max(0));
        separated.push("unlimited_downloads = ");
        separated.push_bind_unseparated(settings.unlimited_downloads);
        separated.push("require_auth = ");
        separated.push_bind_unseparated(settings.require_auth);
        separated.push("notify_on_download = ");
        separated.push_bind_unseparated(settings.notify_on_download);
        if let Some(password) = password {
            separated.push("password = ");
            separated.push_bind_unseparated(password.filter(|p| !p.is_empty()));
        }

        query.push(" WHERE id = ");
        query.push_bind(id);
        query.push(" AND deleted_at IS NULL");

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Move a file to the trash.
    ///
    /// Returns `false` if the file does not exist or is already trashed.
    pub async fn soft_delete(&self, id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE files SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(now_unix())
                .bind(id)
                .execute(self.pool)
                .await
                .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::Database;

    async fn setup_db() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let owner = UserRepository::new(db.pool())
            .create(&NewUser::new("owner", "hash"))
            .await
            .unwrap();
        (db, owner.id)
    }

    fn new_file(owner_id: i64) -> NewFileRecord {
        NewFileRecord {
            id: generate_file_id(),
            name: "notes.txt".to_string(),
            stored_name: "abcd.txt".to_string(),
            size: 5,
            content_type: Some("text/plain".to_string()),
            owner_id,
            settings: FileSettings {
                downloads: 3,
                unlimited_time: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_generate_file_id() {
        let id = generate_file_id();
        assert_eq!(id.len(), FILE_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generate_file_id());
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (db, owner_id) = setup_db().await;
        let repo = FileRepository::new(db.pool());

        let created = repo.create(&new_file(owner_id)).await.unwrap();
        assert_eq!(created.downloads_remaining, 3);
        assert_eq!(created.download_count, 0);
        assert!(!created.has_password());

        let fetched = repo.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "notes.txt");
        assert_eq!(fetched.owner_id, owner_id);
    }

    #[tokio::test]
    async fn test_update_settings_resets_limits() {
        let (db, owner_id) = setup_db().await;
        let repo = FileRepository::new(db.pool());
        let file = repo.create(&new_file(owner_id)).await.unwrap();

        let settings = FileSettings {
            expire_at: 2_000_000_000,
            downloads: 10,
            require_auth: true,
            ..Default::default()
        };
        let updated = repo
            .update_settings(&file.id, &settings, Some(Some("sealed".to_string())))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.downloads_remaining, 10);
        assert_eq!(updated.expire_at, 2_000_000_000);
        assert!(!updated.unlimited_time);
        assert!(updated.require_auth);
        assert_eq!(updated.password.as_deref(), Some("sealed"));

        // Keep the password when it is not part of the update.
        let kept = repo
            .update_settings(&file.id, &settings, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.password.as_deref(), Some("sealed"));

        let cleared = repo
            .update_settings(&file.id, &settings, Some(None))
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.password.is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_file() {
        let (db, owner_id) = setup_db().await;
        let repo = FileRepository::new(db.pool());
        let file = repo.create(&new_file(owner_id)).await.unwrap();

        assert!(repo.soft_delete(&file.id).await.unwrap());
        assert!(repo.get(&file.id).await.unwrap().is_none());
        assert!(!repo.soft_delete(&file.id).await.unwrap());
        assert!(repo.list_by_owner(owner_id).await.unwrap().is_empty());
        assert!(repo
            .update_settings(&file.id, &FileSettings::default(), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_by_owner() {
        let (db, owner_id) = setup_db().await;
        let repo = FileRepository::new(db.pool());
        repo.create(&new_file(owner_id)).await.unwrap();
        repo.create(&new_file(owner_id)).await.unwrap();

        assert_eq!(repo.list_by_owner(owner_id).await.unwrap().len(), 2);
        assert!(repo.list_by_owner(owner_id + 1).await.unwrap().is_empty());
    }
}
