//! Download account dashboard.
//!
//! Authenticated by the global `dg_session` cookie issued at registration,
//! not by system-user tokens.

use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};

use crate::account::DownloadAccount;
use crate::audit::{AuditAction, ClientInfo, EntityType, NewAuditEntry};
use crate::datetime::now_unix;
use crate::download::credential::{global_session_email, GLOBAL_SESSION_COOKIE};
use crate::web::dto::{AccountResponse, ApiResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Number of history rows shown on the dashboard.
const HISTORY_LIMIT: i64 = 50;

async fn session_account(
    state: &AppState,
    jar: &SignedCookieJar,
) -> Result<DownloadAccount, ApiError> {
    let email = jar
        .get(GLOBAL_SESSION_COOKIE)
        .and_then(|c| global_session_email(c.value(), now_unix()))
        .ok_or_else(|| ApiError::unauthorized("Not signed in"))?;

    state
        .accounts
        .find_active_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Not signed in"))
}

/// GET /api/account - Profile and download history.
pub async fn get_account(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Json<ApiResponse<AccountResponse>>, ApiError> {
    let account = session_account(&state, &jar).await?;
    let history = state
        .accounts
        .download_history(account.id, HISTORY_LIMIT)
        .await?;
    Ok(Json(ApiResponse::new(AccountResponse::new(&account, history))))
}

/// DELETE /api/account - Anonymize the signed-in account and sign out.
pub async fn delete_account(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    client: ClientInfo,
) -> Result<(SignedCookieJar, Json<ApiResponse<()>>), ApiError> {
    let account = session_account(&state, &jar).await?;
    state.accounts.anonymize(account.id).await?;
    state
        .audit
        .record(
            NewAuditEntry::new(AuditAction::AccountAnonymize, EntityType::DownloadAccount)
                .entity(account.id)
                .actor(Some(account.id), None)
                .client(&client),
        )
        .await;

    let jar = jar.remove(Cookie::build(GLOBAL_SESSION_COOKIE).path("/"));
    Ok((jar, Json(ApiResponse::new(()))))
}
