//! Team, membership and share persistence.

use sqlx::SqlitePool;

use super::types::{Team, TeamMember, TeamRole, TeamShare};
use crate::datetime::now_unix;
use crate::{DropgateError, Result};

/// Repository for teams, memberships and file shares.
pub struct TeamRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TeamRepository<'a> {
    /// Create a new TeamRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a team and make `created_by` its owner.
    pub async fn create(&self, name: &str, created_by: i64) -> Result<Team> {
        let now = now_unix();
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM teams WHERE name = ?)")
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;
        if exists {
            return Err(DropgateError::Conflict(format!(
                "team '{name}' already exists"
            )));
        }

        let result =
            sqlx::query("INSERT INTO teams (name, created_by, created_at) VALUES (?, ?, ?)")
                .bind(name)
                .bind(created_by)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        let team_id = result.last_insert_rowid();

        sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role, added_at) VALUES (?, ?, ?, ?)",
        )
        .bind(team_id)
        .bind(created_by)
        .bind(TeamRole::Owner.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(team_id)
            .await?
            .ok_or_else(|| DropgateError::NotFound("team".to_string()))
    }

    /// Get a team by ID.
    pub async fn get(&self, id: i64) -> Result<Option<Team>> {
        let team = sqlx::query_as::<_, Team>(
            "SELECT id, name, created_by, created_at FROM teams WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(team)
    }

    /// List teams the user belongs to.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Team>> {
        let teams = sqlx::query_as::<_, Team>(
            "SELECT t.id, t.name, t.created_by, t.created_at
             FROM teams t
             JOIN team_members m ON m.team_id = t.id
             WHERE m.user_id = ?
             ORDER BY t.name",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(teams)
    }

    /// Role of a user in a team, if they are a member.
    pub async fn member_role(&self, team_id: i64, user_id: i64) -> Result<Option<TeamRole>> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM team_members WHERE team_id = ? AND user_id = ?")
                .bind(team_id)
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?;

        role.map(|r| r.parse().map_err(DropgateError::Database))
            .transpose()
    }

    /// List members of a team.
    pub async fn list_members(&self, team_id: i64) -> Result<Vec<TeamMember>> {
        let members = sqlx::query_as::<_, TeamMember>(
            "SELECT m.team_id, m.user_id, u.username, m.role, m.added_at
             FROM team_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.team_id = ?
             ORDER BY m.added_at, m.user_id",
        )
        .bind(team_id)
        .fetch_all(self.pool)
        .await?;
        Ok(members)
    }

    /// Add a member. Fails with `Conflict` if they already belong to the team.
    pub async fn add_member(&self, team_id: i64, user_id: i64, role: TeamRole) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role, added_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(team_id, user_id) DO NOTHING",
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(now_unix())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DropgateError::Conflict(
                "user is already a member of this team".to_string(),
            ));
        }
        Ok(())
    }

    /// Remove a member. Returns `false` if they were not a member.
    pub async fn remove_member(&self, team_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(team_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of owners in a team.
    pub async fn count_owners(&self, team_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM team_members WHERE team_id = ? AND role = 'owner'",
        )
        .bind(team_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Share a file to a team. Fails with `Conflict` if already shared.
    pub async fn add_share(&self, file_id: &str, team_id: i64, shared_by: i64) -> Result<TeamShare> {
        let share = sqlx::query_as::<_, TeamShare>(
            "INSERT INTO team_files (file_id, team_id, shared_by, shared_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(file_id, team_id) DO NOTHING
             RETURNING file_id, team_id, shared_by, shared_at",
        )
        .bind(file_id)
        .bind(team_id)
        .bind(shared_by)
        .bind(now_unix())
        .fetch_optional(self.pool)
        .await?;

        share.ok_or_else(|| {
            DropgateError::Conflict("file is already shared to this team".to_string())
        })
    }

    /// Remove a share. Returns `false` if the file was not shared to the team.
    pub async fn remove_share(&self, file_id: &str, team_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM team_files WHERE file_id = ? AND team_id = ?")
            .bind(file_id)
            .bind(team_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Teams a file is shared to.
    pub async fn list_shares_for_file(&self, file_id: &str) -> Result<Vec<TeamShare>> {
        let shares = sqlx::query_as::<_, TeamShare>(
            "SELECT file_id, team_id, shared_by, shared_at FROM team_files
             WHERE file_id = ? ORDER BY team_id",
        )
        .bind(file_id)
        .fetch_all(self.pool)
        .await?;
        Ok(shares)
    }
}
