//! GitHub REST API client.
//!
//! Thin wrapper over the endpoints the dashboard proxies: the authenticated
//! user, repository CRUD, and collaborator management. GitHub's own API
//! semantics apply; nothing is reinterpreted here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const API_BASE: &str = "https://api.github.com";

/// GitHub API client authenticated with a user access token.
pub struct GitHubClient {
    access_token: String,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "Repodeck")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = builder
            .send()
            .await
            .context("Failed to make GitHub API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse GitHub API response")
    }

    /// Send a request where GitHub replies with an empty body on success.
    async fn send_no_content(&self, builder: reqwest::RequestBuilder) -> Result<()> {
        let response = builder
            .send()
            .await
            .context("Failed to make GitHub API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error: {} - {}", status, body);
        }

        Ok(())
    }

    /// Fetch the authenticated user.
    pub async fn get_user(&self) -> Result<GitHubUser> {
        self.send(self.request(reqwest::Method::GET, &format!("{}/user", API_BASE)))
            .await
    }

    /// List the authenticated user's repositories.
    pub async fn list_repositories(&self, repo_type: &str, sort: &str) -> Result<Vec<GitHubRepo>> {
        let url = format!(
            "{}/user/repos?type={}&sort={}&per_page=100",
            API_BASE,
            urlencoding::encode(repo_type),
            urlencoding::encode(sort)
        );
        self.send(self.request(reqwest::Method::GET, &url)).await
    }

    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<GitHubRepo> {
        let url = format!("{}/repos/{}/{}", API_BASE, owner, repo);
        self.send(self.request(reqwest::Method::GET, &url)).await
    }

    pub async fn create_repository(&self, new_repo: &NewRepository) -> Result<GitHubRepo> {
        let url = format!("{}/user/repos", API_BASE);
        self.send(self.request(reqwest::Method::POST, &url).json(new_repo))
            .await
    }

    pub async fn update_repository(
        &self,
        owner: &str,
        repo: &str,
        update: &RepositoryUpdate,
    ) -> Result<GitHubRepo> {
        let url = format!("{}/repos/{}/{}", API_BASE, owner, repo);
        self.send(self.request(reqwest::Method::PATCH, &url).json(update))
            .await
    }

    pub async fn delete_repository(&self, owner: &str, repo: &str) -> Result<()> {
        let url = format!("{}/repos/{}/{}", API_BASE, owner, repo);
        self.send_no_content(self.request(reqwest::Method::DELETE, &url))
            .await
    }

    pub async fn list_collaborators(&self, owner: &str, repo: &str) -> Result<Vec<Collaborator>> {
        let url = format!("{}/repos/{}/{}/collaborators", API_BASE, owner, repo);
        self.send(self.request(reqwest::Method::GET, &url)).await
    }

    pub async fn add_collaborator(
        &self,
        owner: &str,
        repo: &str,
        username: &str,
        permission: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/collaborators/{}",
            API_BASE, owner, repo, username
        );
        let body = serde_json::json!({ "permission": permission });
        self.send_no_content(self.request(reqwest::Method::PUT, &url).json(&body))
            .await
    }

    pub async fn remove_collaborator(&self, owner: &str, repo: &str, username: &str) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/collaborators/{}",
            API_BASE, owner, repo, username
        );
        self.send_no_content(self.request(reqwest::Method::DELETE, &url))
            .await
    }

    /// Aggregate dashboard stats from the user's repositories.
    pub async fn get_user_stats(&self) -> Result<UserStats> {
        let repos = self.list_repositories("all", "updated").await?;

        let total_repos = repos.len();
        let total_stars: u64 = repos.iter().map(|r| r.stargazers_count).sum();
        let mut languages: HashMap<String, u32> = HashMap::new();
        for repo in &repos {
            if let Some(lang) = &repo.language {
                *languages.entry(lang.clone()).or_insert(0) += 1;
            }
        }

        Ok(UserStats {
            total_repos,
            total_stars,
            languages,
            repos,
        })
    }
}

/// The authenticated GitHub user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: u64,
    pub login: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// A GitHub repository as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub private: bool,
    pub html_url: String,
}

/// A repository collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: u64,
    pub login: String,
    pub avatar_url: Option<String>,
}

/// Request body for creating a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRepository {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
}

/// Request body for updating a repository. Only present fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
}

/// Aggregated dashboard statistics.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub total_repos: usize,
    pub total_stars: u64,
    pub languages: HashMap<String, u32>,
    pub repos: Vec<GitHubRepo>,
}
