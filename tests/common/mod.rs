//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use tempfile::TempDir;

use dropgate::auth::register_with_role;
use dropgate::config::Config;
use dropgate::file::FileStorage;
use dropgate::notify::NotificationPool;
use dropgate::web::middleware::RateLimitState;
use dropgate::web::{create_router, AppState};
use dropgate::{Database, Role, User, UserRepository};

/// Password given to every test user.
pub const PASSWORD: &str = "password123";

/// A server over an in-memory database and a temporary storage directory.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub state: AppState,
    _storage: TempDir,
}

/// Configuration used by every test app.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.security.secret = "integration-test-secret-0123456789abcdef".to_string();
    config.security.jwt_access_token_expiry_secs = 900;
    config.files.max_upload_size_mb = 1;
    config
}

impl TestApp {
    /// Spawn an app over a fresh in-memory database.
    pub async fn spawn() -> Self {
        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        Self::with_database(db).await
    }

    /// Spawn an app over the given database.
    pub async fn with_database(db: Database) -> Self {
        let storage_dir = TempDir::new().expect("Failed to create storage dir");
        let storage = FileStorage::new(storage_dir.path()).expect("Failed to create storage");
        let config = test_config();

        let state = AppState::new(db.clone(), storage, &config, NotificationPool::disabled());
        let router = create_router(
            state.clone(),
            Arc::new(RateLimitState::new(1000, 1000)),
            &[],
            Duration::from_secs(30),
        );
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            db,
            state,
            _storage: storage_dir,
        }
    }

    /// Create a system user.
    pub async fn create_user(&self, username: &str, role: Role) -> User {
        let repo = UserRepository::new(self.db.pool());
        register_with_role(&repo, username, PASSWORD, role)
            .await
            .expect("Failed to create user")
    }

    /// Log in and return an access token.
    pub async fn login(&self, username: &str) -> String {
        let response = self
            .server
            .post("/api/auth/login")
            .json(&json!({ "username": username, "password": PASSWORD }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["data"]["access_token"]
            .as_str()
            .expect("access_token missing")
            .to_string()
    }

    /// Create a user and log in as them.
    pub async fn user_with_token(&self, username: &str, role: Role) -> (User, String) {
        let user = self.create_user(username, role).await;
        let token = self.login(username).await;
        (user, token)
    }

    /// Upload `content` as `filename` with the given multipart settings
    /// fields and return the file ID.
    pub async fn upload(
        &self,
        token: &str,
        filename: &str,
        content: &[u8],
        fields: &[(&str, String)],
    ) -> String {
        let response = self.upload_response(token, filename, content, fields).await;
        response.assert_status_ok();
        response.json::<Value>()["data"]["id"]
            .as_str()
            .expect("file id missing")
            .to_string()
    }

    /// Upload and return the raw response.
    pub async fn upload_response(
        &self,
        token: &str,
        filename: &str,
        content: &[u8],
        fields: &[(&str, String)],
    ) -> TestResponse {
        let mut form = MultipartForm::new();
        for (name, value) in fields {
            form = form.add_text(*name, value.clone());
        }
        form = form.add_part(
            "file",
            Part::bytes(content.to_vec())
                .file_name(filename)
                .mime_type("text/plain"),
        );

        self.server
            .post("/api/files")
            .add_header(AUTHORIZATION, bearer(token))
            .multipart(form)
            .await
    }
}

/// Authorization header value.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Unix seconds one day from now.
pub fn tomorrow() -> i64 {
    dropgate::datetime::now_unix() + 24 * 3600
}
