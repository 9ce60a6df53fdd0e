//! Records shared between the stores, the gateway and the front ends.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ChatIdentity;

/// A repository as returned by the GitHub REST API (the fields we use).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Denormalized repository entry kept on the user record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub is_private: bool,
}

impl From<&Repository> for RepoSummary {
    fn from(r: &Repository) -> Self {
        Self {
            name: r.name.clone(),
            full_name: r.full_name.clone(),
            url: r.html_url.clone(),
            is_private: r.private,
        }
    }
}

/// Parameters for creating a repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRepository {
    pub name: String,
    pub description: String,
    pub private: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// One entry of a repository directory listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoContent {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// The GitHub profile of the token owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingProfile {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Per-chat user record. Authoritative copy lives in the durable store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub chat_identity: ChatIdentity,
    #[serde(default)]
    pub hosting_identity: Option<String>,
    #[serde(default)]
    hosting_token: Option<String>,
    #[serde(default)]
    pub hosting_username: Option<String>,
    #[serde(default)]
    pub has_agreed_to_terms: bool,
    #[serde(default)]
    is_linked: bool,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub repositories: Vec<RepoSummary>,
}

impl UserRecord {
    pub fn new(chat_identity: ChatIdentity, now: DateTime<Utc>) -> Self {
        Self {
            chat_identity,
            hosting_identity: None,
            hosting_token: None,
            hosting_username: None,
            has_agreed_to_terms: false,
            is_linked: false,
            created_at: now,
            last_active_at: now,
            repositories: Vec::new(),
        }
    }

    /// Rebuild a record from stored columns. `is_linked` is derived from the token.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        chat_identity: ChatIdentity,
        hosting_identity: Option<String>,
        hosting_token: Option<String>,
        hosting_username: Option<String>,
        has_agreed_to_terms: bool,
        created_at: DateTime<Utc>,
        last_active_at: DateTime<Utc>,
        repositories: Vec<RepoSummary>,
    ) -> Self {
        Self {
            chat_identity,
            hosting_identity,
            hosting_token,
            hosting_username,
            has_agreed_to_terms,
            is_linked: false,
            created_at,
            last_active_at,
            repositories,
        }
        .normalized()
    }

    /// Re-establish `is_linked == token is non-empty` (snapshot payloads are untrusted).
    pub fn normalized(mut self) -> Self {
        if self
            .hosting_token
            .as_deref()
            .map(|t| t.trim().is_empty())
            .unwrap_or(false)
        {
            self.hosting_token = None;
        }
        self.is_linked = self.hosting_token.is_some();
        self
    }

    pub fn is_linked(&self) -> bool {
        self.is_linked
    }

    /// The stored bearer token, when linked.
    pub fn token(&self) -> Option<&str> {
        self.hosting_token.as_deref()
    }

    /// Attach a GitHub token + profile. Re-linking overwrites the previous token.
    pub fn link(&mut self, profile: &HostingProfile, token: String, now: DateTime<Utc>) {
        self.hosting_identity = Some(profile.id.to_string());
        self.hosting_username = Some(profile.login.clone());
        self.hosting_token = Some(token);
        self.last_active_at = now;
        self.is_linked = self
            .hosting_token
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        if !self.is_linked {
            self.hosting_token = None;
        }
    }

    pub fn set_repositories(&mut self, repos: &[Repository]) {
        self.repositories = repos.iter().map(RepoSummary::from).collect();
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("chat_identity", &self.chat_identity)
            .field("hosting_identity", &self.hosting_identity)
            .field(
                "hosting_token",
                &self.hosting_token.as_ref().map(|_| "<redacted>"),
            )
            .field("hosting_username", &self.hosting_username)
            .field("has_agreed_to_terms", &self.has_agreed_to_terms)
            .field("is_linked", &self.is_linked)
            .field("created_at", &self.created_at)
            .field("last_active_at", &self.last_active_at)
            .field("repositories", &self.repositories.len())
            .finish()
    }
}
