//! Download account dashboard tests.

mod common;

use axum::http::StatusCode;
use axum_extra::extract::cookie::Cookie;
use common::TestApp;
use dropgate::Role;
use serde_json::{json, Value};

const CONTENT: &[u8] = b"for registered eyes";

/// Register a download account at a gated file's link and return the
/// file ID plus both session cookies.
async fn register(app: &TestApp) -> (String, Cookie<'static>, Cookie<'static>) {
    let (_, token) = app.user_with_token("owner", Role::User).await;
    let file_id = app
        .upload(&token, "brief.txt", CONTENT, &[("require_auth", "1".to_string())])
        .await;

    let response = app
        .server
        .post(&format!("/d/{}", file_id))
        .form(&json!({
            "email": "reader@example.com",
            "name": "Reader",
            "account_password": "reader-pass"
        }))
        .await;
    response.assert_status_ok();
    let file_session = response.cookie(&format!("dg_dl_{}", file_id));
    let global_session = response.cookie("dg_session");
    (file_id, file_session, global_session)
}

#[tokio::test]
async fn test_dashboard_requires_session() {
    let app = TestApp::spawn().await;

    app.server
        .get("/api/account")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .delete("/api/account")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dashboard_shows_history() {
    let app = TestApp::spawn().await;
    let (file_id, file_session, global_session) = register(&app).await;

    app.server
        .get(&format!("/d/{}", file_id))
        .add_cookie(file_session)
        .await
        .assert_status_ok();

    let response = app
        .server
        .get("/api/account")
        .add_cookie(global_session)
        .await;
    response.assert_status_ok();
    let data = &response.json::<Value>()["data"];
    assert_eq!(data["email"], "reader@example.com");
    assert_eq!(data["name"], "Reader");
    let downloads = data["downloads"].as_array().unwrap();
    assert_eq!(downloads.len(), 2);
    assert_eq!(downloads[0]["file_id"], file_id);
    assert_eq!(downloads[0]["file_name"], "brief.txt");
}

#[tokio::test]
async fn test_delete_anonymizes_and_revokes_sessions() {
    let app = TestApp::spawn().await;
    let (file_id, file_session, global_session) = register(&app).await;

    let response = app
        .server
        .delete("/api/account")
        .add_cookie(global_session.clone())
        .await;
    response.assert_status_ok();
    let removal = response.cookie("dg_session");
    assert_eq!(removal.value(), "");

    // The old global session no longer resolves to an account.
    app.server
        .get("/api/account")
        .add_cookie(global_session)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Nor does the per-file session.
    let response = app
        .server
        .get(&format!("/d/{}", file_id))
        .add_cookie(file_session)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "login_required");

    // The email was scrubbed, so the old credentials start a new registration.
    let response = app
        .server
        .post(&format!("/d/{}", file_id))
        .form(&json!({
            "email": "reader@example.com",
            "account_password": "reader-pass"
        }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["error"],
        "Name and password are required to create an account"
    );

    // The download log keeps its rows.
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM download_logs WHERE file_id = ?")
        .bind(&file_id)
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}
