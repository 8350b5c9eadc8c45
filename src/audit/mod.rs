//! Append-only audit trail of access decisions and management actions.

mod emitter;
pub mod export;
mod repository;
mod types;

pub use emitter::AuditEmitter;
pub use repository::{AuditLogRepository, AuditQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use types::{AuditAction, AuditLogEntry, ClientInfo, EntityType, NewAuditEntry};
