//! Local user accounts mirroring GitHub identities.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    /// Stable GitHub account id (stringified)
    pub github_id: String,
    pub username: String,
    pub email: Option<String>,
    /// Encrypted access token blob (`iv:tag:ciphertext`), never plaintext
    pub access_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Response DTO that excludes the token blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub github_id: String,
    pub username: String,
    pub email: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            github_id: user.github_id,
            username: user.username,
            email: user.email,
        }
    }
}

pub async fn find_user_by_github_id(
    db: &DbPool,
    github_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE github_id = ?")
        .bind(github_id)
        .fetch_optional(db)
        .await
}

pub async fn find_user_by_username(
    db: &DbPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(db)
        .await
}

/// Create or update a user keyed by GitHub id. Called on every login so the
/// stored (encrypted) token rotates with each authentication.
pub async fn upsert_user(
    db: &DbPool,
    github_id: &str,
    username: &str,
    email: Option<&str>,
    encrypted_token: &str,
) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, github_id, username, email, access_token, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(github_id) DO UPDATE SET
            username = excluded.username,
            email = COALESCE(excluded.email, email),
            access_token = excluded.access_token,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&id)
    .bind(github_id)
    .bind(username)
    .bind(email)
    .bind(encrypted_token)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE github_id = ?")
        .bind(github_id)
        .fetch_one(db)
        .await?;
    Ok(user)
}

/// Update profile fields. A field absent from the request leaves the stored
/// value untouched; this never clears an email.
pub async fn update_user_email(
    db: &DbPool,
    user_id: &str,
    email: Option<&str>,
) -> Result<User, sqlx::Error> {
    if let Some(email) = email {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("UPDATE users SET email = ?, updated_at = ? WHERE id = ?")
            .bind(email)
            .bind(&now)
            .bind(user_id)
            .execute(db)
            .await?;
    }

    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_absent_email_preserves_existing() {
        let pool = db::init_test().await;
        let user = upsert_user(&pool, "123", "octocat", Some("a@b.c"), "enc-blob")
            .await
            .unwrap();

        // A profile update without an email field must not clear it
        let updated = update_user_email(&pool, &user.id, None).await.unwrap();
        assert_eq!(updated.email.as_deref(), Some("a@b.c"));
    }

    #[tokio::test]
    async fn test_present_email_is_updated() {
        let pool = db::init_test().await;
        let user = upsert_user(&pool, "123", "octocat", Some("a@b.c"), "enc-blob")
            .await
            .unwrap();

        let updated = update_user_email(&pool, &user.id, Some("new@b.c"))
            .await
            .unwrap();
        assert_eq!(updated.email.as_deref(), Some("new@b.c"));
    }
}
