//! Authenticated GitHub calls on behalf of a chat, plus the repository-list cache.
//!
//! The list cache lives in the snapshot under `repos_<chat>` as
//! `{ "data": [...], "cachedAt": <epoch millis> }`. It is the only snapshot
//! entry that expires.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    accounts::AccountDirectory,
    domain::ChatIdentity,
    errors::Error,
    hosting::HostingApi,
    model::{ContentKind, NewRepository, RepoContent, RepoSummary, Repository, UserRecord},
    snapshot::repos_key,
    Result,
};

pub const DEFAULT_REPO_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug)]
pub struct GatewayConfig {
    /// Freshness window of the repository-list cache.
    pub repo_cache_ttl: Duration,
    /// Drop the repository-list cache after a successful create.
    pub invalidate_on_create: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            repo_cache_ttl: DEFAULT_REPO_CACHE_TTL,
            invalidate_on_create: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedRepos {
    data: Vec<Repository>,
    cached_at: i64,
}

pub struct RepositoryGateway {
    accounts: Arc<AccountDirectory>,
    hosting: Arc<dyn HostingApi>,
    cfg: GatewayConfig,
}

impl RepositoryGateway {
    pub fn new(
        accounts: Arc<AccountDirectory>,
        hosting: Arc<dyn HostingApi>,
        cfg: GatewayConfig,
    ) -> Self {
        Self {
            accounts,
            hosting,
            cfg,
        }
    }

    pub async fn list_repositories(&self, chat: &ChatIdentity) -> Result<Vec<Repository>> {
        self.list_repositories_at(chat, Utc::now()).await
    }

    /// Same as `list_repositories` with an explicit clock.
    pub async fn list_repositories_at(
        &self,
        chat: &ChatIdentity,
        now: DateTime<Utc>,
    ) -> Result<Vec<Repository>> {
        let user = self.accounts.require_linked(chat).await?;
        let token = linked_token(&user)?;

        if let Some(hit) = self.cached_repos(chat, now) {
            tracing::debug!(%chat, count = hit.len(), "repository list served from cache");
            return Ok(hit);
        }

        let repos = self.hosting.list_repositories(&token).await?;

        let mirror: Vec<RepoSummary> = repos.iter().map(RepoSummary::from).collect();
        if let Err(e) = self.accounts.set_repositories(chat, &mirror).await {
            tracing::warn!(%chat, "failed to persist repository mirror: {e}");
        }

        let entry = CachedRepos {
            data: repos.clone(),
            cached_at: now.timestamp_millis(),
        };
        match serde_json::to_value(&entry) {
            Ok(v) => self.accounts.snapshot().write(&repos_key(chat), v),
            Err(e) => tracing::warn!(%chat, "cannot cache repository list: {e}"),
        }

        tracing::info!(%chat, count = repos.len(), "repository list fetched");
        Ok(repos)
    }

    pub async fn create_repository(
        &self,
        chat: &ChatIdentity,
        name: &str,
        description: &str,
        is_private: bool,
    ) -> Result<Repository> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::MissingParameter("repository name"));
        }
        let user = self.accounts.require_linked(chat).await?;
        let token = linked_token(&user)?;

        let created = self
            .hosting
            .create_repository(
                &token,
                &NewRepository {
                    name: name.to_string(),
                    description: description.trim().to_string(),
                    private: is_private,
                },
            )
            .await?;

        if self.cfg.invalidate_on_create {
            self.invalidate(chat);
        }
        tracing::info!(%chat, repo = %created.full_name, "repository created");
        Ok(created)
    }

    /// Delete `owner/name` (a bare name resolves against the linked login).
    pub async fn delete_repository(&self, chat: &ChatIdentity, repo: &str) -> Result<String> {
        let user = self.accounts.require_linked(chat).await?;
        let token = linked_token(&user)?;
        let full_name = resolve_full_name(&user, repo)?;

        self.hosting.delete_repository(&token, &full_name).await?;

        let mirror: Vec<RepoSummary> = user
            .repositories
            .iter()
            .filter(|r| r.full_name != full_name)
            .cloned()
            .collect();
        if let Err(e) = self.accounts.set_repositories(chat, &mirror).await {
            tracing::warn!(%chat, "failed to persist repository mirror: {e}");
        }
        self.invalidate(chat);
        tracing::info!(%chat, repo = %full_name, "repository deleted");
        Ok(full_name)
    }

    /// Directory listing of `path` in `owner/name`: directories first, then by name.
    pub async fn list_contents(
        &self,
        chat: &ChatIdentity,
        repo: &str,
        path: &str,
    ) -> Result<(String, Vec<RepoContent>)> {
        let user = self.accounts.require_linked(chat).await?;
        let token = linked_token(&user)?;
        let full_name = resolve_full_name(&user, repo)?;
        let path = path.trim().trim_matches('/');

        let mut entries = self
            .hosting
            .list_contents(&token, &full_name, path)
            .await?;
        entries.sort_by(|a, b| {
            let rank = |c: &RepoContent| if c.kind == ContentKind::Dir { 0 } else { 1 };
            rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
        });
        Ok((full_name, entries))
    }

    pub fn invalidate(&self, chat: &ChatIdentity) {
        self.accounts.snapshot().remove(&repos_key(chat));
    }

    fn cached_repos(&self, chat: &ChatIdentity, now: DateTime<Utc>) -> Option<Vec<Repository>> {
        let raw = self.accounts.snapshot().read(&repos_key(chat))?;
        let entry: CachedRepos = match serde_json::from_value(raw) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(%chat, "ignoring unreadable repository cache: {e}");
                return None;
            }
        };
        let age_ms = now.timestamp_millis() - entry.cached_at;
        if age_ms < self.cfg.repo_cache_ttl.as_millis() as i64 {
            Some(entry.data)
        } else {
            None
        }
    }
}

fn linked_token(user: &UserRecord) -> Result<String> {
    user.token()
        .map(|t| t.to_string())
        .ok_or(Error::Unauthenticated)
}

fn resolve_full_name(user: &UserRecord, repo: &str) -> Result<String> {
    let repo = repo.trim().trim_matches('/');
    if repo.is_empty() {
        return Err(Error::MissingParameter("repository name"));
    }
    if repo.contains('/') {
        return Ok(repo.to_string());
    }
    match &user.hosting_username {
        Some(login) => Ok(format!("{login}/{repo}")),
        None => Ok(repo.to_string()),
    }
}
