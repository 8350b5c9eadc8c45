//! Download log: one immutable row per successful delivery.

use serde::Serialize;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

use crate::{DropgateError, Result};

/// A recorded delivery.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DownloadLogEntry {
    /// Row ID.
    pub id: i64,
    /// Delivered file.
    pub file_id: String,
    /// Download account, when the delivery was authenticated.
    pub account_id: Option<i64>,
    /// Client IP.
    pub ip: String,
    /// Client User-Agent.
    pub user_agent: String,
    /// Delivery time (unix seconds).
    pub downloaded_at: i64,
    /// Whether a download account was signed in.
    ///
    /// System users who bypass the gates are not download accounts, so their
    /// deliveries are logged with `authenticated = false`. The audit entry for
    /// the delivery names the user.
    pub authenticated: bool,
}

/// Data for a new log row.
#[derive(Debug, Clone)]
pub struct NewDownloadLog<'a> {
    /// Delivered file.
    pub file_id: &'a str,
    /// Download account, if any.
    pub account_id: Option<i64>,
    /// Client IP.
    pub ip: &'a str,
    /// Client User-Agent.
    pub user_agent: &'a str,
    /// Delivery time (unix seconds).
    pub downloaded_at: i64,
}

/// Repository for the download log. Rows are never updated or deleted.
pub struct DownloadLogRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DownloadLogRepository<'a> {
    /// Create a new repository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a row.
    pub async fn insert(&self, log: &NewDownloadLog<'_>) -> Result<i64> {
        insert_row(self.pool, log).await
    }

    /// Append a row on an open connection or transaction.
    pub async fn insert_on(
        conn: &mut SqliteConnection,
        log: &NewDownloadLog<'_>,
    ) -> Result<i64> {
        insert_row(conn, log).await
    }

    /// Rows for a file, newest first.
    pub async fn list_for_file(&self, file_id: &str) -> Result<Vec<DownloadLogEntry>> {
        let rows = sqlx::query_as::<_, DownloadLogEntry>(
            "SELECT id, file_id, account_id, ip, user_agent, downloaded_at, authenticated
             FROM download_logs WHERE file_id = ?
             ORDER BY downloaded_at DESC, id DESC",
        )
        .bind(file_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| DropgateError::Database(e.to_string()))?;
        Ok(rows)
    }
}

async fn insert_row<'e, E>(executor: E, log: &NewDownloadLog<'_>) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT INTO download_logs (file_id, account_id, ip, user_agent, downloaded_at, authenticated)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(log.file_id)
    .bind(log.account_id)
    .bind(log.ip)
    .bind(log.user_agent)
    .bind(log.downloaded_at)
    .bind(log.account_id.is_some())
    .execute(executor)
    .await
    .map_err(|e| DropgateError::Database(e.to_string()))?;

    Ok(result.last_insert_rowid())
}
