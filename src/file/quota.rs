//! Quota ledger: consumes one unit of download allowance per delivery.
//!
//! The decrement and the counter increment happen in a single conditional
//! `UPDATE ... RETURNING`, so concurrent deliveries of the same file can never
//! take more downloads than were granted. [`QuotaLedger::consume`] runs the
//! same update on a caller's transaction, so the delivery record can commit
//! or roll back together with it.

use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;

/// Counters after a successful delivery was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct DownloadCounters {
    /// Downloads left (meaningless when `unlimited_downloads` is set).
    pub downloads_remaining: i64,
    /// Whether the quota is unlimited.
    pub unlimited_downloads: bool,
    /// Total successful deliveries.
    pub download_count: i64,
}

/// Quota ledger errors.
#[derive(Error, Debug)]
pub enum QuotaError {
    /// The file does not exist or is in the trash.
    #[error("file not found")]
    NotFound,

    /// The quota was already zero at the moment of the update.
    #[error("download limit reached")]
    AlreadyExhausted,

    /// Store failure.
    #[error("database error: {0}")]
    Database(String),
}

impl From<QuotaError> for crate::DropgateError {
    fn from(e: QuotaError) -> Self {
        match e {
            QuotaError::NotFound => crate::DropgateError::NotFound("file".to_string()),
            QuotaError::AlreadyExhausted => {
                crate::DropgateError::Gone("download limit reached".to_string())
            }
            QuotaError::Database(msg) => crate::DropgateError::Database(msg),
        }
    }
}

/// Atomically consumes download quota.
#[derive(Debug, Clone)]
pub struct QuotaLedger {
    pool: SqlitePool,
}

impl QuotaLedger {
    /// Create a ledger backed by the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record one successful delivery of `file_id`.
    ///
    /// Decrements `downloads_remaining` (unless unlimited) and increments
    /// `download_count`, both only if quota is left at that instant.
    pub async fn record_download(&self, file_id: &str) -> Result<DownloadCounters, QuotaError> {
        let mut conn = self.pool.acquire().await.map_err(database)?;
        Self::consume(&mut conn, file_id).await
    }

    /// [`record_download`](Self::record_download) on an open connection or
    /// transaction.
    pub async fn consume(
        conn: &mut SqliteConnection,
        file_id: &str,
    ) -> Result<DownloadCounters, QuotaError> {
        let updated = sqlx::query_as::<_, DownloadCounters>(
            "UPDATE files
             SET downloads_remaining = CASE WHEN unlimited_downloads = 1
                                            THEN downloads_remaining
                                            ELSE downloads_remaining - 1 END,
                 download_count = download_count + 1
             WHERE id = ? AND deleted_at IS NULL
               AND (unlimited_downloads = 1 OR downloads_remaining > 0)
             RETURNING downloads_remaining, unlimited_downloads, download_count",
        )
        .bind(file_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(database)?;

        if let Some(counters) = updated {
            return Ok(counters);
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM files WHERE id = ? AND deleted_at IS NULL)",
        )
        .bind(file_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(database)?;

        if exists {
            Err(QuotaError::AlreadyExhausted)
        } else {
            Err(QuotaError::NotFound)
        }
    }
}

fn database(e: sqlx::Error) -> QuotaError {
    QuotaError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::file::{generate_file_id, FileRepository, FileSettings, NewFileRecord};
    use crate::Database;

    async fn setup(settings: FileSettings) -> (Database, String) {
        let db = Database::open_in_memory().await.unwrap();
        let owner = UserRepository::new(db.pool())
            .create(&NewUser::new("owner", "hash"))
            .await
            .unwrap();
        let file = FileRepository::new(db.pool())
            .create(&NewFileRecord {
                id: generate_file_id(),
                name: "a.txt".to_string(),
                stored_name: "a.txt".to_string(),
                size: 1,
                content_type: None,
                owner_id: owner.id,
                settings,
            })
            .await
            .unwrap();
        (db, file.id)
    }

    #[tokio::test]
    async fn test_exactly_n_downloads() {
        let (db, id) = setup(FileSettings {
            downloads: 2,
            unlimited_time: true,
            ..Default::default()
        })
        .await;
        let ledger = QuotaLedger::new(db.pool().clone());

        let first = ledger.record_download(&id).await.unwrap();
        assert_eq!(first.downloads_remaining, 1);
        assert_eq!(first.download_count, 1);

        let second = ledger.record_download(&id).await.unwrap();
        assert_eq!(second.downloads_remaining, 0);
        assert_eq!(second.download_count, 2);

        assert!(matches!(
            ledger.record_download(&id).await,
            Err(QuotaError::AlreadyExhausted)
        ));

        // The failed attempt does not touch the counters.
        let file = FileRepository::new(db.pool()).get(&id).await.unwrap().unwrap();
        assert_eq!(file.downloads_remaining, 0);
        assert_eq!(file.download_count, 2);
    }

    #[tokio::test]
    async fn test_unlimited_only_counts() {
        let (db, id) = setup(FileSettings {
            downloads: 0,
            unlimited_downloads: true,
            unlimited_time: true,
            ..Default::default()
        })
        .await;
        let ledger = QuotaLedger::new(db.pool().clone());

        for expected in 1..=5 {
            let counters = ledger.record_download(&id).await.unwrap();
            assert!(counters.unlimited_downloads);
            assert_eq!(counters.downloads_remaining, 0);
            assert_eq!(counters.download_count, expected);
        }
    }

    #[tokio::test]
    async fn test_consume_rolls_back_with_transaction() {
        let (db, id) = setup(FileSettings {
            downloads: 1,
            unlimited_time: true,
            ..Default::default()
        })
        .await;

        let mut tx = db.pool().begin().await.unwrap();
        let counters = QuotaLedger::consume(&mut tx, &id).await.unwrap();
        assert_eq!(counters.downloads_remaining, 0);
        tx.rollback().await.unwrap();

        let file = FileRepository::new(db.pool()).get(&id).await.unwrap().unwrap();
        assert_eq!(file.downloads_remaining, 1);
        assert_eq!(file.download_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_file() {
        let db = Database::open_in_memory().await.unwrap();
        let ledger = QuotaLedger::new(db.pool().clone());
        assert!(matches!(
            ledger.record_download("missing").await,
            Err(QuotaError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_trashed_file_is_not_found() {
        let (db, id) = setup(FileSettings {
            downloads: 3,
            ..Default::default()
        })
        .await;
        FileRepository::new(db.pool()).soft_delete(&id).await.unwrap();

        let ledger = QuotaLedger::new(db.pool().clone());
        assert!(matches!(
            ledger.record_download(&id).await,
            Err(QuotaError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_last_download() {
        let (db, id) = setup(FileSettings {
            downloads: 1,
            ..Default::default()
        })
        .await;
        let ledger = QuotaLedger::new(db.pool().clone());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = ledger.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { ledger.record_download(&id).await }));
        }

        let mut ok = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(QuotaError::AlreadyExhausted) => exhausted += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(exhausted, 9);
    }
}
