//! File handlers for the management API.

use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    Json,
};

use crate::audit::ClientInfo;
use crate::datetime::{now_unix, parse_rfc3339};
use crate::download::DownloadLogRepository;
use crate::file::{evaluate, FileRecord, FileSettings, UploadRequest};
use crate::web::dto::{
    ApiResponse, DownloadLogResponse, FileResponse, PasswordResponse, UpdateSettingsRequest,
    ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

fn file_response(file: &FileRecord) -> FileResponse {
    FileResponse::new(file, evaluate(file, now_unix()))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Expiry as unix seconds or RFC 3339.
fn parse_expiry(value: &str) -> Result<i64, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<i64>()
        .ok()
        .or_else(|| parse_rfc3339(value))
        .ok_or_else(|| ApiError::bad_request("Invalid expire_at"))
}

async fn field_text(field: Field<'_>, name: &str) -> Result<String, ApiError> {
    field.text().await.map_err(|e| {
        tracing::debug!(field = name, error = %e, "Failed to read multipart field");
        ApiError::bad_request(format!("Invalid {name}"))
    })
}

/// GET /api/files - List own files.
pub async fn list_files(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let files = state.files.list_own(&user).await?;
    Ok(Json(ApiResponse::new(
        files.iter().map(file_response).collect(),
    )))
}

/// POST /api/files - Upload a file.
///
/// Request body: multipart/form-data with a `file` part and optional
/// `expire_at`, `unlimited_time`, `downloads`, `unlimited_downloads`,
/// `password`, `require_auth` and `notify_on_download` fields.
pub async fn upload_file(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;

    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;
    let mut settings = FileSettings {
        unlimited_time: true,
        unlimited_downloads: true,
        ..Default::default()
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());
                content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| {
                            tracing::error!("Failed to read file content: {}", e);
                            ApiError::bad_request("Failed to read file")
                        })?
                        .to_vec(),
                );
            }
            "expire_at" => {
                settings.expire_at = parse_expiry(&field_text(field, "expire_at").await?)?;
                settings.unlimited_time = false;
            }
            "unlimited_time" => {
                settings.unlimited_time = parse_flag(&field_text(field, "unlimited_time").await?)
            }
            "downloads" => {
                settings.downloads = field_text(field, "downloads")
                    .await?
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::bad_request("Invalid downloads"))?;
                settings.unlimited_downloads = false;
            }
            "unlimited_downloads" => {
                settings.unlimited_downloads =
                    parse_flag(&field_text(field, "unlimited_downloads").await?)
            }
            "password" => settings.password = Some(field_text(field, "password").await?),
            "require_auth" => {
                settings.require_auth = parse_flag(&field_text(field, "require_auth").await?)
            }
            "notify_on_download" => {
                settings.notify_on_download =
                    parse_flag(&field_text(field, "notify_on_download").await?)
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let content = content.ok_or_else(|| ApiError::bad_request("No file content"))?;

    let mut request = UploadRequest::new(filename, content).with_settings(settings);
    if let Some(ct) = content_type {
        request = request.with_content_type(ct);
    }

    let file = state.files.upload(&request, &user, &client).await?;
    Ok(Json(ApiResponse::new(file_response(&file))))
}

/// GET /api/files/:id - File metadata.
pub async fn get_file(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let file = state.files.get(&file_id, &user).await?;
    Ok(Json(ApiResponse::new(file_response(&file))))
}

/// PUT /api/files/:id/settings - Replace expiration and access settings.
///
/// The new limits count from now: `downloads` becomes the remaining count.
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    Path(file_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let (settings, password) = req.into_parts();
    let file = state
        .files
        .edit_settings(&file_id, &user, &settings, password, &client)
        .await?;
    Ok(Json(ApiResponse::new(file_response(&file))))
}

/// GET /api/files/:id/password - Reveal the stored file password.
pub async fn reveal_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<PasswordResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let password = state
        .files
        .reveal_password(&file_id, &user, &client)
        .await?;
    Ok(Json(ApiResponse::new(PasswordResponse { password })))
}

/// DELETE /api/files/:id - Move a file to the trash.
pub async fn delete_file(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    client: ClientInfo,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = state.current_user(&claims).await?;
    state.files.trash(&file_id, &user, &client).await?;
    Ok(Json(ApiResponse::new(())))
}

/// GET /api/files/:id/downloads - Download log of a file.
pub async fn list_downloads(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<DownloadLogResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let file = state.files.get(&file_id, &user).await?;
    if !state.teams.can_manage_file(&file.id, user.id).await? {
        return Err(ApiError::forbidden("Only the owner may view the download log"));
    }

    let entries = DownloadLogRepository::new(state.db.pool())
        .list_for_file(&file.id)
        .await?;
    Ok(Json(ApiResponse::new(
        entries.into_iter().map(DownloadLogResponse::from).collect(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag(" On "));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_parse_expiry() {
        assert_eq!(parse_expiry("1705276800").unwrap(), 1_705_276_800);
        assert_eq!(parse_expiry("2024-01-15T00:00:00Z").unwrap(), 1_705_276_800);
        assert_eq!(parse_expiry("").unwrap(), 0);
        assert!(parse_expiry("tomorrow").is_err());
    }
}
