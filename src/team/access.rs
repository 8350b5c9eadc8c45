//! Team access resolver.
//!
//! Answers "may this user see/manage this file or team" straight from the
//! store on every call. There is no decision cache, so revoking a membership
//! or a share takes effect on the next check.

use sqlx::SqlitePool;

use super::repository::TeamRepository;
use super::types::{Team, TeamMember, TeamRole, TeamShare};
use crate::db::UserRepository;
use crate::file::FileRepository;
use crate::{DropgateError, Result};

/// Resolves file and team permissions for system users.
#[derive(Debug, Clone)]
pub struct TeamAccessResolver {
    pool: SqlitePool,
}

impl TeamAccessResolver {
    /// Create a resolver backed by the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn teams(&self) -> TeamRepository<'_> {
        TeamRepository::new(&self.pool)
    }

    /// True iff the user owns the file or the file is shared to a team the
    /// user currently belongs to.
    pub async fn can_access(&self, file_id: &str, user_id: i64) -> Result<bool> {
        let allowed: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM files f
                 WHERE f.id = ?1 AND f.deleted_at IS NULL
                   AND (f.owner_id = ?2
                        OR EXISTS(SELECT 1 FROM team_files tf
                                  JOIN team_members tm ON tm.team_id = tf.team_id
                                  WHERE tf.file_id = f.id AND tm.user_id = ?2))
             )",
        )
        .bind(file_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(allowed)
    }

    /// True iff the user is an Owner or Admin of the team, or a system
    /// administrator.
    pub async fn can_manage_members(&self, team_id: i64, user_id: i64) -> Result<bool> {
        let allowed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM team_members
                           WHERE team_id = ?1 AND user_id = ?2 AND role IN ('owner', 'admin'))
                 OR EXISTS(SELECT 1 FROM users
                           WHERE id = ?2 AND role = 'admin' AND is_active = 1)",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(allowed)
    }

    /// True iff the user owns the file or is a system administrator.
    pub async fn can_manage_file(&self, file_id: &str, user_id: i64) -> Result<bool> {
        let allowed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM files
                           WHERE id = ?1 AND deleted_at IS NULL AND owner_id = ?2)
                 OR (EXISTS(SELECT 1 FROM files WHERE id = ?1 AND deleted_at IS NULL)
                     AND EXISTS(SELECT 1 FROM users
                                WHERE id = ?2 AND role = 'admin' AND is_active = 1))",
        )
        .bind(file_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(allowed)
    }

    async fn is_system_admin(&self, user_id: i64) -> Result<bool> {
        Ok(UserRepository::new(&self.pool)
            .get_by_id(user_id)
            .await?
            .is_some_and(|u| u.is_active && u.is_admin()))
    }

    async fn require_team(&self, team_id: i64) -> Result<Team> {
        self.teams()
            .get(team_id)
            .await?
            .ok_or_else(|| DropgateError::NotFound("team".to_string()))
    }

    /// True iff the user may see the team's member list and files.
    pub async fn can_view_team(&self, team_id: i64, user_id: i64) -> Result<bool> {
        if self.teams().member_role(team_id, user_id).await?.is_some() {
            return Ok(true);
        }
        self.is_system_admin(user_id).await
    }

    /// Create a team owned by `creator_id`.
    pub async fn create_team(&self, name: &str, creator_id: i64) -> Result<Team> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DropgateError::Validation(
                "team name cannot be empty".to_string(),
            ));
        }
        self.teams().create(name, creator_id).await
    }

    /// Teams the user belongs to.
    pub async fn list_teams(&self, user_id: i64) -> Result<Vec<Team>> {
        self.teams().list_for_user(user_id).await
    }

    /// Members of a team, visible to members and system administrators.
    pub async fn list_members(&self, team_id: i64, actor_id: i64) -> Result<Vec<TeamMember>> {
        self.require_team(team_id).await?;
        if !self.can_view_team(team_id, actor_id).await? {
            return Err(DropgateError::Permission(
                "not a member of this team".to_string(),
            ));
        }
        self.teams().list_members(team_id).await
    }

    /// Add `user_id` to the team with `role`.
    ///
    /// Only owners and system administrators may grant the Owner role.
    pub async fn add_member(
        &self,
        team_id: i64,
        actor_id: i64,
        user_id: i64,
        role: TeamRole,
    ) -> Result<()> {
        self.require_team(team_id).await?;
        if !self.can_manage_members(team_id, actor_id).await? {
            return Err(DropgateError::Permission(
                "only team owners and admins can add members".to_string(),
            ));
        }
        if role == TeamRole::Owner {
            let actor_role = self.teams().member_role(team_id, actor_id).await?;
            if actor_role != Some(TeamRole::Owner) && !self.is_system_admin(actor_id).await? {
                return Err(DropgateError::Permission(
                    "only team owners can add owners".to_string(),
                ));
            }
        }
        if UserRepository::new(&self.pool)
            .get_by_id(user_id)
            .await?
            .is_none()
        {
            return Err(DropgateError::NotFound("user".to_string()));
        }

        self.teams().add_member(team_id, user_id, role).await
    }

    /// Remove `user_id` from the team.
    ///
    /// Members may remove themselves. The last owner cannot be removed.
    pub async fn remove_member(&self, team_id: i64, actor_id: i64, user_id: i64) -> Result<()> {
        self.require_team(team_id).await?;
        if actor_id != user_id && !self.can_manage_members(team_id, actor_id).await? {
            return Err(DropgateError::Permission(
                "only team owners and admins can remove members".to_string(),
            ));
        }

        let teams = self.teams();
        let Some(role) = teams.member_role(team_id, user_id).await? else {
            return Err(DropgateError::NotFound("team member".to_string()));
        };
        if role == TeamRole::Owner && teams.count_owners(team_id).await? <= 1 {
            return Err(DropgateError::Conflict(
                "cannot remove the last owner of a team".to_string(),
            ));
        }

        teams.remove_member(team_id, user_id).await?;
        Ok(())
    }

    /// Share a file to a team.
    ///
    /// The actor must be able to manage the file and belong to the team
    /// (system administrators are exempt from the membership requirement).
    pub async fn share_file_to_team(
        &self,
        file_id: &str,
        team_id: i64,
        actor_id: i64,
    ) -> Result<TeamShare> {
        if FileRepository::new(&self.pool).get(file_id).await?.is_none() {
            return Err(DropgateError::NotFound("file".to_string()));
        }
        self.require_team(team_id).await?;
        if !self.can_manage_file(file_id, actor_id).await? {
            return Err(DropgateError::Permission(
                "only the file owner can share it".to_string(),
            ));
        }
        if !self.can_view_team(team_id, actor_id).await? {
            return Err(DropgateError::Permission(
                "not a member of this team".to_string(),
            ));
        }

        self.teams().add_share(file_id, team_id, actor_id).await
    }

    /// Remove a file from a team.
    ///
    /// Allowed for whoever can manage the file or the team's members.
    pub async fn unshare_file_from_team(
        &self,
        file_id: &str,
        team_id: i64,
        actor_id: i64,
    ) -> Result<()> {
        self.require_team(team_id).await?;
        if !self.can_manage_file(file_id, actor_id).await?
            && !self.can_manage_members(team_id, actor_id).await?
        {
            return Err(DropgateError::Permission(
                "not allowed to unshare this file".to_string(),
            ));
        }
        if !self.teams().remove_share(file_id, team_id).await? {
            return Err(DropgateError::NotFound("team share".to_string()));
        }
        Ok(())
    }

    /// Teams a file is shared to.
    pub async fn list_shares_for_file(&self, file_id: &str) -> Result<Vec<TeamShare>> {
        self.teams().list_shares_for_file(file_id).await
    }
}
