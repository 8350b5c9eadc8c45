//! System user model for Dropgate.
//!
//! System users own files, belong to teams and use the management API.
//! They are distinct from download accounts, which only exist to satisfy a
//! file's authentication gate.

use std::fmt;
use std::str::FromStr;

/// System user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Role {
    /// Regular user.
    #[default]
    User = 0,
    /// System administrator.
    Admin = 1,
}

impl Role {
    /// Convert role to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A registered system user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login username (unique, case-insensitive).
    pub username: String,
    /// Password hash (Argon2).
    pub password: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// User role.
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Whether the account is active.
    pub is_active: bool,
    /// Creation time (unix seconds).
    pub created_at: i64,
}

impl User {
    /// Check if this user is a system administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Password hash (should be pre-hashed with Argon2).
    pub password: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// User role (defaults to User).
    pub role: Role,
}

impl NewUser {
    /// Create a new user with minimal required fields.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: None,
            role: Role::User,
        }
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("sysop".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_new_user_builder() {
        let user = NewUser::new("alice", "hash")
            .with_email("alice@example.com")
            .with_role(Role::Admin);
        assert_eq!(user.username, "alice");
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(user.role, Role::Admin);
    }
}
