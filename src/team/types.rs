//! Team types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a user inside one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    /// Created the team or was promoted; may manage members.
    Owner,
    /// May manage members.
    Admin,
    /// Regular member.
    Member,
}

impl TeamRole {
    /// Convert role to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
        }
    }

    /// Whether this role may add or remove members.
    pub fn can_manage_members(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TeamRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(TeamRole::Owner),
            "admin" => Ok(TeamRole::Admin),
            "member" => Ok(TeamRole::Member),
            _ => Err(format!("unknown team role: {s}")),
        }
    }
}

impl TryFrom<String> for TeamRole {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A team.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Team {
    /// Team ID.
    pub id: i64,
    /// Unique team name.
    pub name: String,
    /// System user who created the team.
    pub created_by: i64,
    /// Creation time (unix seconds).
    pub created_at: i64,
}

/// Membership of a user in a team.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamMember {
    /// Team ID.
    pub team_id: i64,
    /// Member user ID.
    pub user_id: i64,
    /// Member username.
    pub username: String,
    /// Role in the team.
    #[sqlx(try_from = "String")]
    pub role: TeamRole,
    /// When the member was added (unix seconds).
    pub added_at: i64,
}

/// A file shared to a team.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamShare {
    /// Shared file ID.
    pub file_id: String,
    /// Team ID.
    pub team_id: i64,
    /// User who shared the file.
    pub shared_by: i64,
    /// When the share was created (unix seconds).
    pub shared_at: i64,
}
