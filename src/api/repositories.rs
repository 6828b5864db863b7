//! Repository proxy endpoints.
//!
//! Each handler decrypts the caller's stored GitHub token on demand, performs
//! the upstream call, and mirrors the result into the local store. Mutations
//! append an activity row after the data change; the two are deliberately
//! independent operations.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::db::{
    delete_repository, record_activity, upsert_repository, ActivityAction, RepoUpsert,
};
use crate::github::{self, Collaborator, GitHubRepo, NewRepository, RepositoryUpdate};
use crate::AppState;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type", default = "default_repo_type")]
    pub repo_type: String,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default)]
    pub search: String,
}

fn default_repo_type() -> String {
    "all".to_string()
}

fn default_sort() -> String {
    "updated".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AddCollaboratorRequest {
    pub username: String,
    #[serde(default = "default_permission")]
    pub permission: String,
}

fn default_permission() -> String {
    "push".to_string()
}

fn mirror_fields(repo: &GitHubRepo) -> RepoUpsert {
    RepoUpsert {
        name: repo.name.clone(),
        description: repo.description.clone(),
        language: repo.language.clone(),
        stars: Some(repo.stargazers_count as i64),
        forks: Some(repo.forks_count as i64),
    }
}

/// List the caller's repositories from GitHub, refreshing the local mirror.
pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<GitHubRepo>>, ApiError> {
    let github = github::client_for(&state.cipher, &user)?;
    let repos = github
        .list_repositories(&query.repo_type, &query.sort)
        .await?;

    let needle = query.search.to_lowercase();
    let filtered: Vec<GitHubRepo> = repos
        .into_iter()
        .filter(|repo| {
            needle.is_empty()
                || repo.name.to_lowercase().contains(&needle)
                || repo
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
        .collect();

    for repo in &filtered {
        upsert_repository(&state.db, &repo.id.to_string(), &user.id, &mirror_fields(repo))
            .await?;
    }

    Ok(Json(filtered))
}

/// Fetch a single repository from GitHub.
pub async fn get(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<GitHubRepo>, ApiError> {
    let github = github::client_for(&state.cipher, &user)?;
    let repository = github.get_repository(&owner, &repo).await?;
    Ok(Json(repository))
}

/// Create a repository on GitHub and mirror it locally.
pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<NewRepository>,
) -> Result<(StatusCode, Json<GitHubRepo>), ApiError> {
    if request.name.is_empty() {
        return Err(ApiError::bad_request("Repository name is required"));
    }

    let github = github::client_for(&state.cipher, &user)?;
    let created = github.create_repository(&request).await?;

    upsert_repository(
        &state.db,
        &created.id.to_string(),
        &user.id,
        &mirror_fields(&created),
    )
    .await?;

    record_activity(
        &state.db,
        &user.id,
        ActivityAction::CreateRepository,
        &format!("Created repository: {}", created.name),
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a repository on GitHub and refresh its mirror row.
pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((owner, repo)): Path<(String, String)>,
    Json(request): Json<RepositoryUpdate>,
) -> Result<Json<GitHubRepo>, ApiError> {
    let github = github::client_for(&state.cipher, &user)?;
    let updated = github.update_repository(&owner, &repo, &request).await?;

    upsert_repository(
        &state.db,
        &updated.id.to_string(),
        &user.id,
        &mirror_fields(&updated),
    )
    .await?;

    record_activity(
        &state.db,
        &user.id,
        ActivityAction::UpdateRepository,
        &format!("Updated repository: {}", updated.name),
    )
    .await;

    Ok(Json(updated))
}

/// Delete a repository on GitHub and drop its mirror row.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let github = github::client_for(&state.cipher, &user)?;

    // Resolve the stable id before the upstream delete; the mirror is keyed
    // by id, not by name
    let github_id = match github.get_repository(&owner, &repo).await {
        Ok(r) => Some(r.id.to_string()),
        Err(e) => {
            tracing::warn!(
                owner = owner,
                repo = repo,
                error = %e,
                "Failed to resolve repository id before delete; a mirror row may go stale"
            );
            None
        }
    };

    github.delete_repository(&owner, &repo).await?;

    if let Some(github_id) = github_id {
        delete_repository(&state.db, &github_id).await?;
    }

    record_activity(
        &state.db,
        &user.id,
        ActivityAction::DeleteRepository,
        &format!("Deleted repository: {}", repo),
    )
    .await;

    Ok(Json(serde_json::json!({
        "message": "Repository deleted successfully"
    })))
}

pub async fn list_collaborators(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<Vec<Collaborator>>, ApiError> {
    let github = github::client_for(&state.cipher, &user)?;
    let collaborators = github.list_collaborators(&owner, &repo).await?;
    Ok(Json(collaborators))
}

pub async fn add_collaborator(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((owner, repo)): Path<(String, String)>,
    Json(request): Json<AddCollaboratorRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.username.is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }

    let github = github::client_for(&state.cipher, &user)?;
    github
        .add_collaborator(&owner, &repo, &request.username, &request.permission)
        .await?;

    record_activity(
        &state.db,
        &user.id,
        ActivityAction::AddCollaborator,
        &format!("Added collaborator {} to repository: {}", request.username, repo),
    )
    .await;

    Ok(Json(serde_json::json!({
        "message": "Collaborator added successfully"
    })))
}

pub async fn remove_collaborator(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((owner, repo, username)): Path<(String, String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let github = github::client_for(&state.cipher, &user)?;
    github.remove_collaborator(&owner, &repo, &username).await?;

    record_activity(
        &state.db,
        &user.id,
        ActivityAction::RemoveCollaborator,
        &format!("Removed collaborator {} from repository: {}", username, repo),
    )
    .await;

    Ok(Json(serde_json::json!({
        "message": "Collaborator removed successfully"
    })))
}
