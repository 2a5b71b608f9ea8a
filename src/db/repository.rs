//! Database repository for team member CRUD operations.
//!
//! Writes only touch the targeted row; the store's constraints decide races.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{NewTeamMember, Role, TeamMember};

const MEMBER_COLUMNS: &str =
    "id, first_name, last_name, email, phone_number, role, created_at, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List all members, newest first.
    pub async fn list_members(&self) -> Result<Vec<TeamMember>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM team_members ORDER BY created_at DESC, id DESC",
            MEMBER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(member_from_row).collect()
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: i64) -> Result<Option<TeamMember>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM team_members WHERE id = ?",
            MEMBER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(member_from_row).transpose()
    }

    /// Id of the member currently holding `email`, if any.
    pub async fn find_email_owner(&self, email: &str) -> Result<Option<i64>, AppError> {
        let row = sqlx::query("SELECT id FROM team_members WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("id")))
    }

    /// Insert a new member with a fresh id and both timestamps set to now.
    pub async fn create_member(&self, new: &NewTeamMember) -> Result<TeamMember, AppError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO team_members (first_name, last_name, email, phone_number, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.phone_number)
        .bind(new.role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(TeamMember {
            id: result.last_insert_rowid(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            email: new.email.clone(),
            phone_number: new.phone_number.clone(),
            role: new.role,
            created_at: now,
            updated_at: now,
        })
    }

    /// Persist every mutable field of `member` and bump its updated timestamp.
    ///
    /// `id` and `created_at` are never written.
    pub async fn update_member(&self, member: &TeamMember) -> Result<TeamMember, AppError> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE team_members SET first_name = ?, last_name = ?, email = ?, phone_number = ?, role = ?, updated_at = ? WHERE id = ?"
        )
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(&member.phone_number)
        .bind(member.role.as_str())
        .bind(now)
        .bind(member.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Deleted between read and write
            return Err(AppError::member_not_found(member.id));
        }

        Ok(TeamMember {
            updated_at: now,
            ..member.clone()
        })
    }

    /// Delete a member.
    pub async fn delete_member(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM team_members WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::member_not_found(id));
        }

        Ok(())
    }

    pub async fn count_members(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM team_members")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }
}

// ==================== ROW MAPPING ====================

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TeamMember, AppError> {
    let role: String = row.try_get("role")?;
    let role = Role::from_str(&role)
        .ok_or_else(|| AppError::Internal(format!("Unknown role '{}' in store", role)))?;

    Ok(TeamMember {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        role,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
