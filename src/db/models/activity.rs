//! Append-only activity log.
//!
//! Every mutating operation (API action or synchronized webhook event)
//! appends one row. Rows are never updated or deleted, and redeliveries may
//! append duplicates; the log is an audit trail, not a deduplicated store.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub details: String,
    pub created_at: String,
}

/// Fixed action vocabulary for activity rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    CreateRepository,
    UpdateRepository,
    DeleteRepository,
    PushRepository,
    StarRepository,
    ForkRepository,
    AddCollaborator,
    RemoveCollaborator,
    UpdateProfile,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateRepository => "CREATE_REPOSITORY",
            Self::UpdateRepository => "UPDATE_REPOSITORY",
            Self::DeleteRepository => "DELETE_REPOSITORY",
            Self::PushRepository => "PUSH_REPOSITORY",
            Self::StarRepository => "STAR_REPOSITORY",
            Self::ForkRepository => "FORK_REPOSITORY",
            Self::AddCollaborator => "ADD_COLLABORATOR",
            Self::RemoveCollaborator => "REMOVE_COLLABORATOR",
            Self::UpdateProfile => "UPDATE_PROFILE",
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append an activity row.
pub async fn log_activity(
    db: &DbPool,
    user_id: &str,
    action: ActivityAction,
    details: &str,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO activities (id, user_id, action, details, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(action.as_str())
    .bind(details)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(())
}

/// Append an activity row, swallowing failures.
///
/// The data mutation it describes has already been applied; a failed audit
/// append is logged at warn and must not roll anything back.
pub async fn record_activity(db: &DbPool, user_id: &str, action: ActivityAction, details: &str) {
    if let Err(e) = log_activity(db, user_id, action, details).await {
        tracing::warn!(
            user_id = user_id,
            action = %action,
            error = %e,
            "Failed to record activity entry"
        );
    }
}

/// Response for listing activities with pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityListResponse {
    pub items: Vec<Activity>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// List a user's activities, newest first.
pub async fn list_activities(
    db: &DbPool,
    user_id: &str,
    page: i64,
    per_page: i64,
) -> Result<ActivityListResponse, sqlx::Error> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(db)
        .await?;

    let items: Vec<Activity> = sqlx::query_as(
        "SELECT * FROM activities WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(db)
    .await?;

    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    Ok(ActivityListResponse {
        items,
        total,
        page,
        per_page,
        total_pages,
    })
}
