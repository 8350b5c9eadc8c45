//! Audit log persistence and querying.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::types::{AuditAction, AuditLogEntry, EntityType, NewAuditEntry};
use crate::datetime::now_unix;
use crate::{DropgateError, Result};

/// Default page size for audit queries.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for audit queries.
pub const MAX_PAGE_SIZE: i64 = 500;

/// Filters for listing audit entries.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Only this actor.
    pub actor_id: Option<i64>,
    /// Only this action.
    pub action: Option<AuditAction>,
    /// Only this entity type.
    pub entity_type: Option<EntityType>,
    /// Only this entity.
    pub entity_id: Option<String>,
    /// Inclusive lower bound (unix seconds).
    pub from: Option<i64>,
    /// Inclusive upper bound (unix seconds).
    pub to: Option<i64>,
    /// Only successes (`Some(true)`) or failures (`Some(false)`).
    pub success: Option<bool>,
    /// Substring match on actor, entity, details and error message.
    pub search: Option<String>,
    /// Rows to skip.
    pub offset: i64,
    /// Rows to return; `0` means no limit.
    pub limit: i64,
}

/// Repository for audit entries. Insert-only from the application's side.
pub struct AuditLogRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditLogRepository<'a> {
    /// Create a new repository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry and return its ID.
    pub async fn insert(&self, entry: &NewAuditEntry) -> Result<i64> {
        let details = entry.details.as_ref().map(|d| d.to_string());
        let result = sqlx::query(
            "INSERT INTO audit_logs (actor_id, actor_email, action, entity_type, entity_id,
                                     details, ip, user_agent, created_at, success, error_message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.actor_id)
        .bind(&entry.actor_email)
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(&entry.entity_id)
        .bind(details)
        .bind(Some(entry.client.ip.as_str()).filter(|s| !s.is_empty()))
        .bind(Some(entry.client.user_agent.as_str()).filter(|s| !s.is_empty()))
        .bind(now_unix())
        .bind(entry.success)
        .bind(&entry.error_message)
        .execute(self.pool)
        .await
        .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &AuditQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(actor_id) = query.actor_id {
            builder.push(" AND actor_id = ").push_bind(actor_id);
        }
        if let Some(action) = query.action {
            builder.push(" AND action = ").push_bind(action.as_str());
        }
        if let Some(entity_type) = query.entity_type {
            builder
                .push(" AND entity_type = ")
                .push_bind(entity_type.as_str());
        }
        if let Some(entity_id) = &query.entity_id {
            builder.push(" AND entity_id = ").push_bind(entity_id.clone());
        }
        if let Some(from) = query.from {
            builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND created_at <= ").push_bind(to);
        }
        if let Some(success) = query.success {
            builder.push(" AND success = ").push_bind(success);
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            builder.push(" AND (");
            for (i, column) in ["actor_email", "entity_id", "details", "error_message"]
                .iter()
                .enumerate()
            {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder
                    .push(*column)
                    .push(" LIKE ")
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\'");
            }
            builder.push(")");
        }
    }

    /// List entries matching the query, newest first.
    pub async fn list(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, actor_id, actor_email, action, entity_type, entity_id, details, ip,
                    user_agent, created_at, success, error_message
             FROM audit_logs",
        );
        Self::push_filters(&mut builder, query);
        builder.push(" ORDER BY created_at DESC, id DESC");
        if query.limit > 0 {
            builder.push(" LIMIT ").push_bind(query.limit);
            builder.push(" OFFSET ").push_bind(query.offset.max(0));
        }

        let rows = builder
            .build_query_as::<AuditLogEntry>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;
        Ok(rows)
    }

    /// Count entries matching the query (ignores offset and limit).
    pub async fn count(&self, query: &AuditQuery) -> Result<i64> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_logs");
        Self::push_filters(&mut builder, query);

        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;
        Ok(count)
    }
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
