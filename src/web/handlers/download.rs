//! Retrieval handlers: `/d/{id}` and `/s/{id}`.
//!
//! Both retrieval methods walk the gate chain. Credentials issued along the
//! way are set as signed cookies on every response, including prompts and
//! errors, so a recipient who registered is not asked again when the final
//! step fails.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};

use crate::audit::ClientInfo;
use crate::datetime::now_unix;
use crate::download::{
    CredentialKind, CredentialSubmission, DeliveryTicket, DenyReason, GateOutcome,
    IssuedCredential, PresentedCredentials, RetrievalRequest,
};
use crate::web::dto::{ApiResponse, DownloadQuery, GatePromptResponse, SplashResponse, UnlockForm};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::{JwtClaims, OptionalAuthUser};

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters are dropped, quotes and backslashes replaced in the
/// plain `filename` parameter, and non-ASCII names additionally carried in
/// an RFC 5987 `filename*` parameter.
pub(crate) fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\') {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// Build the cookie for an issued credential.
pub(crate) fn build_cookie(credential: &IssuedCredential, now: i64) -> Cookie<'static> {
    Cookie::build((credential.cookie_name(), credential.value.clone()))
        .path(credential.cookie_path())
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(credential.max_age_secs(now)))
        .build()
}

/// Read the credentials relevant to `file_id` from the signed jar.
///
/// Cookies with a bad signature are dropped by the jar and never reach the
/// gate chain.
fn presented_credentials(jar: &SignedCookieJar, file_id: &str) -> PresentedCredentials {
    let value = |kind: CredentialKind| {
        jar.get(&kind.cookie_name(Some(file_id)))
            .map(|c| c.value().to_string())
    };
    PresentedCredentials {
        file_password: value(CredentialKind::FilePassword),
        file_session: value(CredentialKind::FileSession),
        global_session: value(CredentialKind::GlobalSession),
    }
}

fn deny_error(reason: DenyReason) -> ApiError {
    match reason {
        DenyReason::NotFound => ApiError::not_found("File not found"),
        DenyReason::ExpiredByTime | DenyReason::ExpiredByQuota => ApiError::gone(format!(
            "This file is no longer available: {}",
            reason.message()
        )),
    }
}

/// GET /d/:id - Retrieve a file, prompting for credentials as needed.
pub async fn retrieve_file(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    OptionalAuthUser(claims): OptionalAuthUser,
    client: ClientInfo,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    run_gate(&state, jar, claims, client, file_id, query.is_direct(), None).await
}

/// POST /d/:id - Submit a file password or download account credentials.
pub async fn unlock_file(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    OptionalAuthUser(claims): OptionalAuthUser,
    client: ClientInfo,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
    Form(form): Form<UnlockForm>,
) -> Response {
    let submission = CredentialSubmission::from(form);
    run_gate(
        &state,
        jar,
        claims,
        client,
        file_id,
        query.is_direct(),
        Some(submission),
    )
    .await
}

async fn run_gate(
    state: &AppState,
    jar: SignedCookieJar,
    claims: Option<JwtClaims>,
    client: ClientInfo,
    file_id: String,
    direct: bool,
    submission: Option<CredentialSubmission>,
) -> Response {
    let now = now_unix();
    let user = match state.optional_user(claims.as_ref()).await {
        Ok(user) => user,
        Err(e) => return (jar, e).into_response(),
    };

    let request = RetrievalRequest {
        credentials: presented_credentials(&jar, &file_id),
        file_id,
        submission,
        direct,
        user,
        client,
        now,
    };

    let decision = match state.gate.evaluate(&request).await {
        Ok(decision) => decision,
        Err(e) => return (jar, ApiError::from(e)).into_response(),
    };

    let jar = decision
        .issued
        .iter()
        .fold(jar, |jar, credential| jar.add(build_cookie(credential, now)));

    match decision.outcome {
        GateOutcome::Denied(reason) => (jar, deny_error(reason)).into_response(),
        GateOutcome::PromptCredentials { prompt, error } => (
            jar,
            Json(GatePromptResponse::new(prompt, &request.file_id, error)),
        )
            .into_response(),
        GateOutcome::Cleared(ticket) => {
            match stream_file(state, ticket, &request.client, now).await {
                Ok(response) => (jar, response).into_response(),
                Err(e) => (jar, e).into_response(),
            }
        }
    }
}

/// Redeem a ticket and stream the blob.
///
/// The blob is opened before the quota is consumed, so a missing blob never
/// costs a download.
async fn stream_file(
    state: &AppState,
    ticket: DeliveryTicket,
    client: &ClientInfo,
    now: i64,
) -> Result<Response, ApiError> {
    let stream = state
        .files
        .storage()
        .open_stream(&ticket.file.stored_name)
        .await
        .map_err(|e| {
            tracing::error!(file_id = %ticket.file.id, error = %e, "Failed to open file blob");
            ApiError::internal("Failed to read file")
        })?;

    let delivery = state.gate.deliver(ticket, client, now).await?;
    let file = delivery.file;

    Response::builder()
        .header(header::CONTENT_TYPE, file.mime_type())
        .header(header::CONTENT_DISPOSITION, content_disposition_header(&file.name))
        .header(header::CONTENT_LENGTH, file.size)
        .body(Body::from_stream(stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            ApiError::internal("Failed to build response")
        })
}

/// GET /s/:id - Landing information for a shared link.
pub async fn splash(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<SplashResponse>>, ApiError> {
    let (file, availability) = state
        .gate
        .availability(&file_id, now_unix())
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if let Some(reason) = DenyReason::for_availability(availability) {
        return Err(deny_error(reason));
    }
    Ok(Json(ApiResponse::new(SplashResponse::new(&file, availability))))
}
