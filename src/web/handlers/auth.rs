//! Authentication handlers for system users.

use axum::{extract::State, Json};

use crate::audit::{AuditAction, ClientInfo, EntityType, NewAuditEntry};
use crate::auth::verify_password;
use crate::db::UserRepository;
use crate::web::dto::{ApiResponse, LoginRequest, LoginResponse, UserInfo, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// POST /api/auth/login - User login.
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_by_username(&req.username)
        .await?;

    let entry = NewAuditEntry::new(AuditAction::UserLogin, EntityType::User)
        .actor(user.as_ref().map(|u| u.id), Some(&req.username))
        .client(&client);

    let user = match user {
        Some(user) if verify_password(&req.password, &user.password).is_ok() => user,
        found => {
            if let Some(user) = found {
                tracing::debug!(user_id = user.id, "Login with wrong password");
            }
            state.audit.record(entry.failed("invalid credentials")).await;
            return Err(ApiError::unauthorized("Invalid username or password"));
        }
    };

    if !user.is_active {
        state.audit.record(entry.failed("account disabled")).await;
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let access_token = state.jwt.generate_access_token(&user)?;
    state.audit.record(entry.entity(user.id)).await;
    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    Ok(Json(ApiResponse::new(LoginResponse {
        access_token,
        expires_in: state.jwt.access_token_expiry,
        user: UserInfo::from(&user),
    })))
}

/// GET /api/auth/me - Current user.
pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = state.current_user(&claims).await?;
    Ok(Json(ApiResponse::new(UserInfo::from(&user))))
}
