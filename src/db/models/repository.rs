//! Mirrored repository metadata.
//!
//! Rows are keyed by the stable GitHub id, never by name. Concurrent writes
//! for the same id converge last-write-wins on whatever fields the update
//! carries; fields absent from an update are left untouched.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Repository {
    pub id: String,
    /// Stable GitHub repository id (stringified)
    pub github_id: String,
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: i64,
    pub forks: i64,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields carried by one mirror update. `None` means the source payload did
/// not include the field; an existing row keeps its value for it.
#[derive(Debug, Clone, Default)]
pub struct RepoUpsert {
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
}

/// Idempotent upsert keyed by `github_id`. Replaying the same update leaves
/// exactly one row.
pub async fn upsert_repository(
    db: &DbPool,
    github_id: &str,
    owner_id: &str,
    update: &RepoUpsert,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO repositories (id, github_id, name, description, language, stars, forks, owner_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, COALESCE(?, 0), COALESCE(?, 0), ?, ?, ?)
        ON CONFLICT(github_id) DO UPDATE SET
            name = excluded.name,
            description = COALESCE(excluded.description, description),
            language = COALESCE(excluded.language, language),
            stars = COALESCE(?, stars),
            forks = COALESCE(?, forks),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&id)
    .bind(github_id)
    .bind(&update.name)
    .bind(&update.description)
    .bind(&update.language)
    .bind(update.stars)
    .bind(update.forks)
    .bind(owner_id)
    .bind(&now)
    .bind(&now)
    .bind(update.stars)
    .bind(update.forks)
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a mirrored repository by its stable GitHub id. Returns whether a
/// row was actually deleted (replays and unknown ids are no-ops).
pub async fn delete_repository(db: &DbPool, github_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM repositories WHERE github_id = ?")
        .bind(github_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_repository_by_github_id(
    db: &DbPool,
    github_id: &str,
) -> Result<Option<Repository>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM repositories WHERE github_id = ?")
        .bind(github_id)
        .fetch_optional(db)
        .await
}

pub async fn list_repositories_for_owner(
    db: &DbPool,
    owner_id: &str,
) -> Result<Vec<Repository>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM repositories WHERE owner_id = ? ORDER BY updated_at DESC")
        .bind(owner_id)
        .fetch_all(db)
        .await
}
