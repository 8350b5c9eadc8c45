//! Audit emitter.
//!
//! Recording an entry never fails the caller. Transient store errors are
//! retried a few times; an entry that still cannot be written is logged in
//! full under the `audit` tracing target so it lands in the log file.

use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{debug, error, warn};

use super::repository::AuditLogRepository;
use super::types::NewAuditEntry;

/// Attempts per entry before falling back to the log.
pub const MAX_ATTEMPTS: u32 = 3;

const RETRY_DELAY: Duration = Duration::from_millis(25);

/// Append-only sink for access decisions.
#[derive(Debug, Clone)]
pub struct AuditEmitter {
    pool: SqlitePool,
}

impl AuditEmitter {
    /// Create an emitter backed by the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an entry.
    ///
    /// Returns whether the entry reached the store.
    pub async fn record(&self, entry: NewAuditEntry) -> bool {
        let repo = AuditLogRepository::new(&self.pool);

        for attempt in 1..=MAX_ATTEMPTS {
            match repo.insert(&entry).await {
                Ok(id) => {
                    debug!(audit_id = id, action = %entry.action, "Audit entry recorded");
                    return true;
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, action = %entry.action, "Audit insert failed, retrying");
                    tokio::time::sleep(RETRY_DELAY * attempt).await;
                }
                Err(e) => {
                    error!(
                        target: "audit",
                        error = %e,
                        action = %entry.action,
                        entity_type = %entry.entity_type,
                        entity_id = entry.entity_id.as_deref().unwrap_or(""),
                        actor_id = ?entry.actor_id,
                        actor_email = entry.actor_email.as_deref().unwrap_or(""),
                        ip = %entry.client.ip,
                        user_agent = %entry.client.user_agent,
                        success = entry.success,
                        error_message = entry.error_message.as_deref().unwrap_or(""),
                        details = %entry.details.as_ref().map(|d| d.to_string()).unwrap_or_default(),
                        "Audit entry could not be persisted"
                    );
                }
            }
        }
        false
    }
}
