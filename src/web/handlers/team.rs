//! Team handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use crate::audit::{AuditAction, ClientInfo, EntityType, NewAuditEntry};
use crate::datetime::now_unix;
use crate::db::User;
use crate::file::{evaluate, FileRepository};
use crate::web::dto::{
    AddMemberRequest, ApiResponse, CreateTeamRequest, FileResponse, ShareFileRequest,
    TeamMemberResponse, TeamResponse, TeamShareResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

fn team_entry(action: AuditAction, team_id: i64, user: &User, client: &ClientInfo) -> NewAuditEntry {
    NewAuditEntry::new(action, EntityType::Team)
        .entity(team_id)
        .actor(Some(user.id), Some(&user.username))
        .client(client)
}

/// Record the outcome of a team operation and pass the result through.
async fn audited<T>(
    state: &AppState,
    entry: NewAuditEntry,
    result: crate::Result<T>,
) -> Result<T, ApiError> {
    match result {
        Ok(value) => {
            state.audit.record(entry).await;
            Ok(value)
        }
        Err(e) => {
            state.audit.record(entry.failed(e.to_string())).await;
            Err(e.into())
        }
    }
}

/// POST /api/teams - Create a team. The creator becomes its owner.
pub async fn create_team(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<CreateTeamRequest>,
) -> Result<Json<ApiResponse<TeamResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let team = state.teams.create_team(&req.name, user.id).await?;
    state
        .audit
        .record(
            team_entry(AuditAction::TeamCreate, team.id, &user, &client)
                .details(json!({ "name": team.name })),
        )
        .await;
    tracing::info!(team_id = team.id, created_by = user.id, "Team created");
    Ok(Json(ApiResponse::new(TeamResponse::from(team))))
}

/// GET /api/teams - Teams the caller belongs to.
pub async fn list_teams(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<TeamResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let teams = state.teams.list_teams(user.id).await?;
    Ok(Json(ApiResponse::new(
        teams.into_iter().map(TeamResponse::from).collect(),
    )))
}

/// GET /api/teams/:id/members - Members of a team.
pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<TeamMemberResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let members = state.teams.list_members(team_id, user.id).await?;
    Ok(Json(ApiResponse::new(
        members.into_iter().map(TeamMemberResponse::from).collect(),
    )))
}

/// POST /api/teams/:id/members - Add a member.
pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    Path(team_id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let entry = team_entry(AuditAction::TeamMemberAdd, team_id, &user, &client)
        .details(json!({ "user_id": req.user_id, "role": req.role.as_str() }));
    let result = state
        .teams
        .add_member(team_id, user.id, req.user_id, req.role)
        .await;
    audited(&state, entry, result).await?;
    Ok(Json(ApiResponse::new(())))
}

/// DELETE /api/teams/:id/members/:user_id - Remove a member.
///
/// Access through the team's shares ends immediately.
pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    Path((team_id, member_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let entry = team_entry(AuditAction::TeamMemberRemove, team_id, &user, &client)
        .details(json!({ "user_id": member_id }));
    let result = state.teams.remove_member(team_id, user.id, member_id).await;
    audited(&state, entry, result).await?;
    Ok(Json(ApiResponse::new(())))
}

/// GET /api/teams/:id/files - Files shared to a team.
pub async fn list_team_files(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;
    // Resolves 404 for unknown teams and 403 for outsiders.
    state.teams.list_members(team_id, user.id).await?;

    let now = now_unix();
    let files = FileRepository::new(state.db.pool())
        .list_by_team(team_id)
        .await?;
    Ok(Json(ApiResponse::new(
        files
            .iter()
            .map(|f| FileResponse::new(f, evaluate(f, now)))
            .collect(),
    )))
}

/// POST /api/teams/:id/files - Share a file to a team.
pub async fn share_file(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    Path(team_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ShareFileRequest>,
) -> Result<Json<ApiResponse<TeamShareResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let entry = team_entry(AuditAction::TeamFileShare, team_id, &user, &client)
        .details(json!({ "file_id": req.file_id }));
    let result = state
        .teams
        .share_file_to_team(&req.file_id, team_id, user.id)
        .await;
    let share = audited(&state, entry, result).await?;
    Ok(Json(ApiResponse::new(TeamShareResponse::from(share))))
}

/// DELETE /api/teams/:id/files/:file_id - Remove a file from a team.
pub async fn unshare_file(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    Path((team_id, file_id)): Path<(i64, String)>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let entry = team_entry(AuditAction::TeamFileUnshare, team_id, &user, &client)
        .details(json!({ "file_id": file_id }));
    let result = state
        .teams
        .unshare_file_from_team(&file_id, team_id, user.id)
        .await;
    audited(&state, entry, result).await?;
    Ok(Json(ApiResponse::new(())))
}
