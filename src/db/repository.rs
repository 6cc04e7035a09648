//! Database repository for team member records.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{MemberFields, TeamMember};

const MEMBER_COLUMNS: &str = "id, name, title, description, profile_image, telegram_link, facebook_link, phone_number, created_at, updated_at";

/// Record store for team members.
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
            "SELECT {MEMBER_COLUMNS} FROM team_members ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(member_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: &str) -> Result<Option<TeamMember>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(member_from_row).transpose()?)
    }

    /// Create a new member.
    pub async fn create_member(
        &self,
        fields: &MemberFields,
        profile_image: Option<&str>,
    ) -> Result<TeamMember, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now();

        sqlx::query(
            "INSERT INTO team_members (id, name, title, description, profile_image, telegram_link, facebook_link, phone_number, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&fields.name)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(profile_image)
        .bind(&fields.telegram_link)
        .bind(&fields.facebook_link)
        .bind(&fields.phone_number)
        .bind(timestamp(&now))
        .bind(timestamp(&now))
        .execute(&self.pool)
        .await?;

        Ok(build_member(id, fields, profile_image, now, now))
    }

    /// Replace the editable fields and image reference of a member.
    pub async fn update_member(
        &self,
        id: &str,
        fields: &MemberFields,
        profile_image: Option<&str>,
    ) -> Result<TeamMember, AppError> {
        let existing = self
            .get_member(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Team member {} not found", id)))?;

        // Keep updated_at strictly monotonic even on coarse clocks.
        let now = now().max(existing.updated_at + chrono::Duration::microseconds(1));

        let result = sqlx::query(
            "UPDATE team_members SET name = ?, title = ?, description = ?, profile_image = ?, telegram_link = ?, facebook_link = ?, phone_number = ?, updated_at = ? WHERE id = ?"
        )
        .bind(&fields.name)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(profile_image)
        .bind(&fields.telegram_link)
        .bind(&fields.facebook_link)
        .bind(&fields.phone_number)
        .bind(timestamp(&now))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Team member {} not found", id)));
        }

        Ok(build_member(
            id.to_string(),
            fields,
            profile_image,
            existing.created_at,
            now,
        ))
    }

    /// Delete a member.
    pub async fn delete_member(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM team_members WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Team member {} not found", id)));
        }

        Ok(())
    }

    /// Number of stored members.
    pub async fn count_members(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) FROM team_members")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get(0)?)
    }
}

// Helper functions for row conversion

fn now() -> DateTime<Utc> {
    // Stored precision is microseconds; truncate so round trips compare equal.
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn build_member(
    id: String,
    fields: &MemberFields,
    profile_image: Option<&str>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> TeamMember {
    TeamMember {
        id,
        name: fields.name.clone(),
        title: fields.title.clone(),
        description: fields.description.clone(),
        profile_image: profile_image.map(str::to_string),
        telegram_link: fields.telegram_link.clone(),
        facebook_link: fields.facebook_link.clone(),
        phone_number: fields.phone_number.clone(),
        created_at,
        updated_at,
    }
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TeamMember, sqlx::Error> {
    Ok(TeamMember {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        profile_image: row.try_get("profile_image")?,
        telegram_link: row.try_get("telegram_link")?,
        facebook_link: row.try_get("facebook_link")?,
        phone_number: row.try_get("phone_number")?,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}

fn parse_timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        (Repository::new(pool), dir)
    }

    fn fields(name: &str) -> MemberFields {
        MemberFields {
            name: name.to_string(),
            title: "Engineer".to_string(),
            description: "x".to_string(),
            telegram_link: Some("https://t.me/someone".to_string()),
            facebook_link: None,
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let (repo, _dir) = repo().await;

        let created = repo
            .create_member(&fields("Ada"), Some("team-members/a.png"))
            .await
            .unwrap();
        let fetched = repo.get_member(&created.id).await.unwrap().unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let (repo, _dir) = repo().await;

        let first = repo.create_member(&fields("First"), None).await.unwrap();
        let second = repo.create_member(&fields("Second"), None).await.unwrap();

        let listed = repo.list_members().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    }

    #[tokio::test]
    async fn test_update_replaces_fields_and_advances_updated_at() {
        let (repo, _dir) = repo().await;

        let created = repo.create_member(&fields("Ada"), None).await.unwrap();
        let updated = repo
            .update_member(&created.id, &fields("Ada Lovelace"), Some("team-members/b.png"))
            .await
            .unwrap();

        assert_eq!(updated.name, "Ada Lovelace");
        assert_eq!(updated.profile_image.as_deref(), Some("team-members/b.png"));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);

        let fetched = repo.get_member(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let (repo, _dir) = repo().await;

        assert!(repo.get_member("missing").await.unwrap().is_none());
        assert!(matches!(
            repo.update_member("missing", &fields("Ada"), None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete_member("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let (repo, _dir) = repo().await;

        let created = repo.create_member(&fields("Ada"), None).await.unwrap();
        assert_eq!(repo.count_members().await.unwrap(), 1);

        repo.delete_member(&created.id).await.unwrap();
        assert_eq!(repo.count_members().await.unwrap(), 0);
        assert!(repo.get_member(&created.id).await.unwrap().is_none());
    }
}
