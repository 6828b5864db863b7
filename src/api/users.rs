//! User-facing endpoints: dashboard stats, activity feed, and profile.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::db::{
    list_activities, list_repositories_for_owner, record_activity, update_user_email, Activity,
    ActivityAction, ActivityListResponse, Repository, UserResponse,
};
use crate::github::{self, UserStats};
use crate::AppState;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub repositories: Vec<Repository>,
    pub recent_activities: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
}

/// Live dashboard stats pulled from GitHub.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserStats>, ApiError> {
    let github = github::client_for(&state.cipher, &user)?;
    let stats = github.get_user_stats().await?;
    Ok(Json(stats))
}

/// Paginated local activity feed, newest first.
pub async fn activities(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ActivityListResponse>, ApiError> {
    let page = list_activities(&state.db, &user.id, query.page, query.limit).await?;
    Ok(Json(page))
}

/// Local profile: user record, mirrored repositories, and recent activity.
pub async fn profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let repositories = list_repositories_for_owner(&state.db, &user.id).await?;
    let recent = list_activities(&state.db, &user.id, 1, 5).await?;

    Ok(Json(ProfileResponse {
        user: user.into(),
        repositories,
        recent_activities: recent.items,
    }))
}

/// Update profile fields (currently just email). Fields absent from the
/// request body keep their stored values.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = update_user_email(&state.db, &user.id, request.email.as_deref()).await?;

    record_activity(
        &state.db,
        &user.id,
        ActivityAction::UpdateProfile,
        "Updated profile information",
    )
    .await;

    Ok(Json(updated.into()))
}
