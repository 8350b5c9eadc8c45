//! User repository for Dropgate.
//!
//! This module provides CRUD operations for system users.

use sqlx::SqlitePool;

use super::user::{NewUser, User};
use crate::datetime::now_unix;
use crate::{DropgateError, Result};

const USER_COLUMNS: &str = "id, username, password, email, role, is_active, created_at";

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// Returns the created user with the assigned ID.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        if self.username_exists(&new_user.username).await? {
            return Err(DropgateError::Conflict(format!(
                "username '{}' is already taken",
                new_user.username
            )));
        }

        let result = sqlx::query(
            "INSERT INTO users (username, password, email, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(&new_user.email)
        .bind(new_user.role.as_str())
        .bind(now_unix())
        .execute(self.pool)
        .await
        .map_err(|e| DropgateError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DropgateError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ? COLLATE NOCASE");
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Activate or deactivate a user.
    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all users.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await
            .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Check if a username already exists (case-insensitive).
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? COLLATE NOCASE)",
        )
        .bind(username)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DropgateError::Database(e.to_string()))?;

        Ok(exists)
    }
}
