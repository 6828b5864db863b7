//! Synchronizes verified GitHub webhook events into the local mirror.
//!
//! Events arrive after signature verification, are decoded once into a
//! closed [`EventKind`], and each handler applies idempotent upserts or
//! deletes keyed by the stable GitHub id. Unmatched users and unknown kinds
//! are no-ops, never errors; accounts are never created from webhook side
//! effects.

use serde::Deserialize;
use thiserror::Error;

use crate::db::{
    delete_repository, find_user_by_github_id, find_user_by_username, record_activity,
    upsert_repository, ActivityAction, DbPool, RepoUpsert, User,
};

/// Webhook event kinds this service handles, decoded once at the trust
/// boundary from the `X-GitHub-Event` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Repository,
    Push,
    Star,
    Fork,
    Member,
    Ping,
    /// Anything else the event source may grow; accepted and ignored.
    Unknown(String),
}

impl EventKind {
    pub fn parse(header: &str) -> Self {
        match header {
            "repository" => Self::Repository,
            "push" => Self::Push,
            "star" => Self::Star,
            "fork" => Self::Fork,
            "member" => Self::Member,
            "ping" => Self::Ping,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// What a delivery did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A mutation was applied and an activity row appended (best effort).
    Applied(ActivityAction),
    /// The sender maps to no local user; nothing was changed.
    NoMatchingUser,
    /// Unknown or informational event kind, or an action we don't track.
    Ignored,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

// Payload shapes. Counts are optional so a payload that omits them leaves
// the mirrored values untouched.

#[derive(Debug, Deserialize)]
struct EventRepo {
    id: u64,
    name: String,
    description: Option<String>,
    language: Option<String>,
    stargazers_count: Option<i64>,
    forks_count: Option<i64>,
    owner: Option<Account>,
}

impl EventRepo {
    fn github_id(&self) -> String {
        self.id.to_string()
    }

    fn as_upsert(&self) -> RepoUpsert {
        RepoUpsert {
            name: self.name.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
            stars: self.stargazers_count,
            forks: self.forks_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Account {
    id: u64,
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryEvent {
    action: String,
    repository: EventRepo,
    sender: Account,
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    repository: EventRepo,
    pusher: Pusher,
}

#[derive(Debug, Deserialize)]
struct Pusher {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StarEvent {
    action: String,
    repository: EventRepo,
    sender: Account,
}

#[derive(Debug, Deserialize)]
struct ForkEvent {
    forkee: EventRepo,
    repository: EventRepo,
}

#[derive(Debug, Deserialize)]
struct MemberEvent {
    action: String,
    member: Account,
    repository: EventRepo,
    sender: Account,
}

/// Applies webhook events to the local mirror.
pub struct EventSynchronizer {
    db: DbPool,
}

impl EventSynchronizer {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Handle one verified delivery. The body is parsed here, after the
    /// signature has already been checked over the raw bytes.
    pub async fn handle(&self, kind: EventKind, body: &[u8]) -> Result<SyncOutcome, SyncError> {
        match kind {
            EventKind::Repository => self.handle_repository(serde_json::from_slice(body)?).await,
            EventKind::Push => self.handle_push(serde_json::from_slice(body)?).await,
            EventKind::Star => self.handle_star(serde_json::from_slice(body)?).await,
            EventKind::Fork => self.handle_fork(serde_json::from_slice(body)?).await,
            EventKind::Member => self.handle_member(serde_json::from_slice(body)?).await,
            EventKind::Ping => Ok(SyncOutcome::Ignored),
            EventKind::Unknown(name) => {
                tracing::debug!(event = %name, "Ignoring unhandled webhook event kind");
                Ok(SyncOutcome::Ignored)
            }
        }
    }

    async fn resolve_sender(&self, sender: &Account) -> Result<Option<User>, sqlx::Error> {
        find_user_by_github_id(&self.db, &sender.id.to_string()).await
    }

    async fn handle_repository(&self, event: RepositoryEvent) -> Result<SyncOutcome, SyncError> {
        let Some(user) = self.resolve_sender(&event.sender).await? else {
            return Ok(self.noop(&event.sender.login));
        };

        let github_id = event.repository.github_id();
        let name = event.repository.name.clone();

        let (action, details) = match event.action.as_str() {
            "created" => {
                upsert_repository(&self.db, &github_id, &user.id, &event.repository.as_upsert())
                    .await?;
                (
                    ActivityAction::CreateRepository,
                    format!("Created repository: {}", name),
                )
            }
            "edited" => {
                upsert_repository(&self.db, &github_id, &user.id, &event.repository.as_upsert())
                    .await?;
                (
                    ActivityAction::UpdateRepository,
                    format!("Updated repository: {}", name),
                )
            }
            "deleted" => {
                if !delete_repository(&self.db, &github_id).await? {
                    // Already gone (redelivery or never mirrored)
                    return Ok(SyncOutcome::Ignored);
                }
                (
                    ActivityAction::DeleteRepository,
                    format!("Deleted repository: {}", name),
                )
            }
            other => {
                tracing::debug!(action = other, "Ignoring repository event action");
                return Ok(SyncOutcome::Ignored);
            }
        };

        record_activity(&self.db, &user.id, action, &details).await;
        Ok(SyncOutcome::Applied(action))
    }

    async fn handle_push(&self, event: PushEvent) -> Result<SyncOutcome, SyncError> {
        // Push payloads identify the actor by name, not by account id
        let Some(user) = find_user_by_username(&self.db, &event.pusher.name).await? else {
            return Ok(self.noop(&event.pusher.name));
        };

        upsert_repository(
            &self.db,
            &event.repository.github_id(),
            &user.id,
            &event.repository.as_upsert(),
        )
        .await?;

        record_activity(
            &self.db,
            &user.id,
            ActivityAction::PushRepository,
            &format!("Pushed to repository: {}", event.repository.name),
        )
        .await;
        Ok(SyncOutcome::Applied(ActivityAction::PushRepository))
    }

    async fn handle_star(&self, event: StarEvent) -> Result<SyncOutcome, SyncError> {
        let Some(user) = self.resolve_sender(&event.sender).await? else {
            return Ok(self.noop(&event.sender.login));
        };

        upsert_repository(
            &self.db,
            &event.repository.github_id(),
            &user.id,
            &event.repository.as_upsert(),
        )
        .await?;

        let verb = if event.action == "created" {
            "Starred"
        } else {
            "Unstarred"
        };
        record_activity(
            &self.db,
            &user.id,
            ActivityAction::StarRepository,
            &format!("{} repository: {}", verb, event.repository.name),
        )
        .await;
        Ok(SyncOutcome::Applied(ActivityAction::StarRepository))
    }

    async fn handle_fork(&self, event: ForkEvent) -> Result<SyncOutcome, SyncError> {
        // The fork belongs to whoever created it, carried on the forkee
        let Some(owner) = event.forkee.owner.as_ref() else {
            tracing::debug!("Fork event without forkee owner");
            return Ok(SyncOutcome::Ignored);
        };
        let Some(user) = self.resolve_sender(owner).await? else {
            return Ok(self.noop(&owner.login));
        };

        upsert_repository(
            &self.db,
            &event.forkee.github_id(),
            &user.id,
            &event.forkee.as_upsert(),
        )
        .await?;

        record_activity(
            &self.db,
            &user.id,
            ActivityAction::ForkRepository,
            &format!("Forked repository: {}", event.repository.name),
        )
        .await;
        Ok(SyncOutcome::Applied(ActivityAction::ForkRepository))
    }

    async fn handle_member(&self, event: MemberEvent) -> Result<SyncOutcome, SyncError> {
        let Some(user) = self.resolve_sender(&event.sender).await? else {
            return Ok(self.noop(&event.sender.login));
        };

        let (action, verb) = match event.action.as_str() {
            "added" => (ActivityAction::AddCollaborator, "Added"),
            "removed" => (ActivityAction::RemoveCollaborator, "Removed"),
            other => {
                tracing::debug!(action = other, "Ignoring member event action");
                return Ok(SyncOutcome::Ignored);
            }
        };

        record_activity(
            &self.db,
            &user.id,
            action,
            &format!(
                "{} collaborator {} to repository: {}",
                verb, event.member.login, event.repository.name
            ),
        )
        .await;
        Ok(SyncOutcome::Applied(action))
    }

    fn noop(&self, actor: &str) -> SyncOutcome {
        tracing::debug!(actor = actor, "Webhook sender has no local account, skipping");
        SyncOutcome::NoMatchingUser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, Activity, Repository};

    async fn seed_user(pool: &DbPool, github_id: &str, username: &str) -> String {
        let user = db::upsert_user(pool, github_id, username, None, "enc-blob")
            .await
            .unwrap();
        user.id
    }

    async fn repos(pool: &DbPool) -> Vec<Repository> {
        sqlx::query_as("SELECT * FROM repositories")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    async fn activities(pool: &DbPool) -> Vec<Activity> {
        sqlx::query_as("SELECT * FROM activities ORDER BY created_at")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    fn created_event(repo_id: u64, name: &str, sender_id: u64) -> Vec<u8> {
        serde_json::json!({
            "action": "created",
            "repository": {
                "id": repo_id,
                "name": name,
                "description": "a repo",
                "language": "Rust",
                "stargazers_count": 1,
                "forks_count": 0,
            },
            "sender": { "id": sender_id, "login": "octocat" },
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_created_event_replay_is_idempotent() {
        let pool = db::init_test().await;
        seed_user(&pool, "123", "octocat").await;
        let sync = EventSynchronizer::new(pool.clone());

        let body = created_event(555, "hello-world", 123);
        let first = sync.handle(EventKind::Repository, &body).await.unwrap();
        let second = sync.handle(EventKind::Repository, &body).await.unwrap();

        assert_eq!(first, SyncOutcome::Applied(ActivityAction::CreateRepository));
        assert_eq!(second, SyncOutcome::Applied(ActivityAction::CreateRepository));

        // Exactly one mirrored row, but redelivery may duplicate activity rows
        let repos = repos(&pool).await;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].github_id, "555");
        assert_eq!(activities(&pool).await.len(), 2);
    }

    #[tokio::test]
    async fn test_edited_event_updates_mirror_and_logs_once() {
        let pool = db::init_test().await;
        let user_id = seed_user(&pool, "123", "octocat").await;
        let sync = EventSynchronizer::new(pool.clone());

        sync.handle(EventKind::Repository, &created_event(555, "old-name", 123))
            .await
            .unwrap();

        let edited = serde_json::json!({
            "action": "edited",
            "repository": {
                "id": 555,
                "name": "new-name",
                "stargazers_count": 10,
            },
            "sender": { "id": 123, "login": "octocat" },
        })
        .to_string();
        sync.handle(EventKind::Repository, edited.as_bytes())
            .await
            .unwrap();

        let repos = repos(&pool).await;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "new-name");
        assert_eq!(repos[0].stars, 10);
        // Fields absent from the edited payload keep their values
        assert_eq!(repos[0].description.as_deref(), Some("a repo"));
        assert_eq!(repos[0].language.as_deref(), Some("Rust"));

        let updates: Vec<Activity> = activities(&pool)
            .await
            .into_iter()
            .filter(|a| a.action == "UPDATE_REPOSITORY" && a.user_id == user_id)
            .collect();
        assert_eq!(updates.len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_event_removes_by_stable_id() {
        let pool = db::init_test().await;
        seed_user(&pool, "123", "octocat").await;
        let sync = EventSynchronizer::new(pool.clone());

        sync.handle(EventKind::Repository, &created_event(555, "hello-world", 123))
            .await
            .unwrap();

        let deleted = serde_json::json!({
            "action": "deleted",
            "repository": { "id": 555, "name": "renamed-since" },
            "sender": { "id": 123, "login": "octocat" },
        })
        .to_string();

        let outcome = sync
            .handle(EventKind::Repository, deleted.as_bytes())
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Applied(ActivityAction::DeleteRepository));
        assert!(repos(&pool).await.is_empty());

        // Redelivery of the delete finds nothing to remove
        let replay = sync
            .handle(EventKind::Repository, deleted.as_bytes())
            .await
            .unwrap();
        assert_eq!(replay, SyncOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_unmatched_sender_is_noop() {
        let pool = db::init_test().await;
        let sync = EventSynchronizer::new(pool.clone());

        let outcome = sync
            .handle(EventKind::Repository, &created_event(555, "hello-world", 999))
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::NoMatchingUser);
        assert!(repos(&pool).await.is_empty());
        assert!(activities(&pool).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_kind_is_ignored() {
        let pool = db::init_test().await;
        let sync = EventSynchronizer::new(pool);

        let outcome = sync
            .handle(
                EventKind::parse("workflow_run"),
                br#"{"anything": "goes"}"#,
            )
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_push_event_resolves_by_username() {
        let pool = db::init_test().await;
        seed_user(&pool, "123", "octocat").await;
        let sync = EventSynchronizer::new(pool.clone());

        let push = serde_json::json!({
            "repository": {
                "id": 777,
                "name": "pushed-repo",
                "language": "Rust",
                "stargazers_count": 3,
                "forks_count": 1,
            },
            "pusher": { "name": "octocat" },
        })
        .to_string();

        let outcome = sync.handle(EventKind::Push, push.as_bytes()).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Applied(ActivityAction::PushRepository));

        let repos = repos(&pool).await;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].github_id, "777");
        assert_eq!(activities(&pool).await[0].action, "PUSH_REPOSITORY");
    }

    #[tokio::test]
    async fn test_star_event_updates_counts() {
        let pool = db::init_test().await;
        seed_user(&pool, "123", "octocat").await;
        let sync = EventSynchronizer::new(pool.clone());

        sync.handle(EventKind::Repository, &created_event(555, "hello-world", 123))
            .await
            .unwrap();

        let starred = serde_json::json!({
            "action": "created",
            "repository": {
                "id": 555,
                "name": "hello-world",
                "stargazers_count": 42,
            },
            "sender": { "id": 123, "login": "octocat" },
        })
        .to_string();
        sync.handle(EventKind::Star, starred.as_bytes()).await.unwrap();

        let repos = repos(&pool).await;
        assert_eq!(repos[0].stars, 42);
        // Forks were not in the payload and are untouched
        assert_eq!(repos[0].forks, 0);

        let stars: Vec<Activity> = activities(&pool)
            .await
            .into_iter()
            .filter(|a| a.action == "STAR_REPOSITORY")
            .collect();
        assert_eq!(stars.len(), 1);
        assert!(stars[0].details.starts_with("Starred"));
    }

    #[tokio::test]
    async fn test_fork_event_mirrors_forkee_for_fork_owner() {
        let pool = db::init_test().await;
        seed_user(&pool, "456", "forker").await;
        let sync = EventSynchronizer::new(pool.clone());

        let fork = serde_json::json!({
            "forkee": {
                "id": 888,
                "name": "hello-world",
                "owner": { "id": 456, "login": "forker" },
                "stargazers_count": 0,
                "forks_count": 0,
            },
            "repository": { "id": 555, "name": "hello-world" },
        })
        .to_string();

        let outcome = sync.handle(EventKind::Fork, fork.as_bytes()).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Applied(ActivityAction::ForkRepository));

        let repos = repos(&pool).await;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].github_id, "888");
    }

    #[tokio::test]
    async fn test_member_event_logs_without_touching_mirror() {
        let pool = db::init_test().await;
        seed_user(&pool, "123", "octocat").await;
        let sync = EventSynchronizer::new(pool.clone());

        let added = serde_json::json!({
            "action": "added",
            "member": { "id": 456, "login": "collab" },
            "repository": { "id": 555, "name": "hello-world" },
            "sender": { "id": 123, "login": "octocat" },
        })
        .to_string();

        let outcome = sync.handle(EventKind::Member, added.as_bytes()).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Applied(ActivityAction::AddCollaborator));

        assert!(repos(&pool).await.is_empty());
        let acts = activities(&pool).await;
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0].action, "ADD_COLLABORATOR");
        assert!(acts[0].details.contains("collab"));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_an_error() {
        let pool = db::init_test().await;
        let sync = EventSynchronizer::new(pool);

        let result = sync.handle(EventKind::Repository, b"not json").await;
        assert!(matches!(result, Err(SyncError::Payload(_))));
    }
}
