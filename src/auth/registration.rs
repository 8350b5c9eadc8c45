//! System user registration and the startup admin bootstrap.

use tracing::info;

use super::password::hash_password;
use super::validation::validate_name;
use crate::config::AdminConfig;
use crate::db::{NewUser, Role, User, UserRepository};
use crate::{Database, DropgateError, Result};

/// Register a system user with a specific role.
///
/// Fails with `Conflict` if the username is taken.
pub async fn register_with_role(
    repo: &UserRepository<'_>,
    username: &str,
    password: &str,
    role: Role,
) -> Result<User> {
    let username = username.trim();
    validate_name(username).map_err(|e| DropgateError::Validation(e.to_string()))?;

    if repo.username_exists(username).await? {
        return Err(DropgateError::Conflict("username is already taken".to_string()));
    }

    let password_hash = hash_password(password)?;
    let user = repo
        .create(&NewUser::new(username, password_hash).with_role(role))
        .await?;

    info!(username = %user.username, user_id = user.id, role = user.role.as_str(), "System user registered");
    Ok(user)
}

/// Create the first administrator when no system users exist yet.
///
/// Does nothing when users already exist or no username/password is
/// configured. Returns the created user.
pub async fn bootstrap_admin(db: &Database, admin: &AdminConfig) -> Result<Option<User>> {
    let repo = UserRepository::new(db.pool());
    if repo.count().await? > 0 {
        return Ok(None);
    }

    let (username, password) = match (admin.username.trim(), admin.password.as_deref()) {
        ("", _) | (_, None) => {
            tracing::warn!(
                "No system users exist. Set [admin].username and DROPGATE_ADMIN_PASSWORD to create one."
            );
            return Ok(None);
        }
        (username, Some(password)) => (username, password),
    };

    let user = register_with_role(&repo, username, password, Role::Admin).await?;
    info!(username = %user.username, "Bootstrap administrator created");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(username: &str, password: Option<&str>) -> AdminConfig {
        AdminConfig {
            username: username.to_string(),
            password: password.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_register_with_role() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        let user = register_with_role(&repo, "alice", "password123", Role::User)
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::User);
        assert_ne!(user.password, "password123");

        let dup = register_with_role(&repo, "alice", "password123", Role::User).await;
        assert!(matches!(dup, Err(DropgateError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        let result = register_with_role(&repo, "bob", "short", Role::User).await;
        assert!(matches!(result, Err(DropgateError::Validation(_))));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_once() {
        let db = Database::open_in_memory().await.unwrap();
        let config = admin("root", Some("correct horse battery"));

        let created = bootstrap_admin(&db, &config).await.unwrap().unwrap();
        assert!(created.is_admin());

        assert!(bootstrap_admin(&db, &config).await.unwrap().is_none());
        assert_eq!(UserRepository::new(db.pool()).count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_requires_credentials() {
        let db = Database::open_in_memory().await.unwrap();

        assert!(bootstrap_admin(&db, &admin("root", None)).await.unwrap().is_none());
        assert!(bootstrap_admin(&db, &admin("", Some("pw123456"))).await.unwrap().is_none());
        assert_eq!(UserRepository::new(db.pool()).count().await.unwrap(), 0);
    }
}
