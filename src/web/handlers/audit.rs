//! Audit log handlers (system administrators only).

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::audit::{export, AuditAction, AuditLogRepository, ClientInfo, EntityType, NewAuditEntry};
use crate::datetime::{format_timestamp, now_unix};
use crate::db::User;
use crate::web::dto::{AuditLogQuery, AuditLogResponse, PaginatedResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::{AuthUser, JwtClaims};

async fn require_admin(state: &AppState, claims: &JwtClaims) -> Result<User, ApiError> {
    let user = state.current_user(claims).await?;
    if !user.is_admin() {
        return Err(ApiError::forbidden("Admin permission required"));
    }
    Ok(user)
}

/// GET /api/admin/audit-logs - Filtered, paginated audit entries.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(params): Query<AuditLogQuery>,
) -> Result<Json<PaginatedResponse<AuditLogResponse>>, ApiError> {
    require_admin(&state, &claims).await?;
    let query = params.into_query(true)?;

    let repo = AuditLogRepository::new(state.db.pool());
    let total = repo.count(&query).await?;
    let entries = repo.list(&query).await?;

    Ok(Json(PaginatedResponse::new(
        entries.into_iter().map(AuditLogResponse::from).collect(),
        query.offset,
        query.limit,
        total,
    )))
}

/// GET /api/admin/audit-logs/export - Every matching entry as CSV.
pub async fn export_audit_logs(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    Query(params): Query<AuditLogQuery>,
) -> Result<Response, ApiError> {
    let user = require_admin(&state, &claims).await?;
    let query = params.into_query(false)?;

    let entries = AuditLogRepository::new(state.db.pool())
        .list(&query)
        .await?;
    let csv = export::to_csv(&entries, &state.timezone);

    state
        .audit
        .record(
            NewAuditEntry::new(AuditAction::AuditExport, EntityType::AuditLog)
                .actor(Some(user.id), Some(&user.username))
                .client(&client)
                .details(json!({ "rows": entries.len() })),
        )
        .await;

    let filename = format!(
        "audit-logs-{}.csv",
        format_timestamp(now_unix(), &state.timezone, "%Y%m%d-%H%M%S")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    )
        .into_response())
}
