//! User record access: snapshot first, durable store behind it.
//!
//! `AccountDirectory` is the only writer of user records. Each durable upsert
//! is followed by a rewrite of the matching `user_<chat>` snapshot entry, so
//! the snapshot never lags a completed durable write.
//!
//! Writes that touch one field (activity stamp, repository mirror) go to the
//! store as targeted updates, so they cannot roll back a concurrent re-link.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    domain::ChatIdentity,
    errors::Error,
    model::{RepoSummary, UserRecord},
    snapshot::{user_key, SnapshotStore},
    store::UserStore,
    Result,
};

pub struct AccountDirectory {
    store: Arc<dyn UserStore>,
    snapshot: Arc<SnapshotStore>,
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn UserStore>, snapshot: Arc<SnapshotStore>) -> Self {
        Self { store, snapshot }
    }

    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }

    pub async fn get_user(&self, chat: &ChatIdentity) -> Result<Option<UserRecord>> {
        if chat.is_empty() {
            return Err(Error::MissingParameter("chat identity"));
        }

        if let Some(cached) = self.cached_user(chat) {
            return Ok(Some(cached));
        }

        let found = self.store.find(chat).await?;
        if let Some(record) = &found {
            self.write_snapshot(record);
        }
        Ok(found)
    }

    /// Like `get_user`, but only returns records holding a token.
    pub async fn require_linked(&self, chat: &ChatIdentity) -> Result<UserRecord> {
        match self.get_user(chat).await? {
            Some(u) if u.is_linked() => Ok(u),
            _ => Err(Error::Unauthenticated),
        }
    }

    pub async fn save(&self, record: &UserRecord) -> Result<()> {
        self.store.upsert(record).await?;
        self.write_snapshot(record);
        Ok(())
    }

    /// Load or create the record for `chat`, apply `edit`, then save it.
    ///
    /// The base record comes from the durable store, never the snapshot.
    pub async fn upsert_with(
        &self,
        chat: &ChatIdentity,
        now: DateTime<Utc>,
        edit: impl FnOnce(&mut UserRecord),
    ) -> Result<UserRecord> {
        if chat.is_empty() {
            return Err(Error::MissingParameter("chat identity"));
        }
        let mut record = self
            .store
            .find(chat)
            .await?
            .unwrap_or_else(|| UserRecord::new(chat.clone(), now));
        edit(&mut record);
        self.save(&record).await?;
        Ok(record)
    }

    pub async fn agree_to_terms(&self, chat: &ChatIdentity) -> Result<UserRecord> {
        let now = Utc::now();
        self.upsert_with(chat, now, |u| {
            u.has_agreed_to_terms = true;
            u.last_active_at = now;
        })
        .await
    }

    /// Replace the denormalized repository list of `chat`.
    pub async fn set_repositories(&self, chat: &ChatIdentity, repos: &[RepoSummary]) -> Result<()> {
        self.store.set_repositories(chat, repos).await?;
        self.refresh_snapshot(chat).await
    }

    /// Best-effort `last_active_at` bump for known users.
    pub async fn touch(&self, chat: &ChatIdentity) {
        if chat.is_empty() {
            return;
        }
        if let Err(e) = self.store.touch(chat, Utc::now()).await {
            tracing::warn!(%chat, "failed to record activity: {e}");
            return;
        }
        if let Err(e) = self.refresh_snapshot(chat).await {
            tracing::debug!(%chat, "snapshot refresh after touch skipped: {e}");
        }
    }

    /// Re-mirror the durable record after a targeted update.
    async fn refresh_snapshot(&self, chat: &ChatIdentity) -> Result<()> {
        match self.store.find(chat).await? {
            Some(record) => self.write_snapshot(&record),
            None => self.snapshot.remove(&user_key(chat)),
        }
        Ok(())
    }

    fn cached_user(&self, chat: &ChatIdentity) -> Option<UserRecord> {
        let raw = self.snapshot.read(&user_key(chat))?;
        match serde_json::from_value::<UserRecord>(raw) {
            Ok(u) if &u.chat_identity == chat => Some(u.normalized()),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(%chat, "ignoring unreadable snapshot user entry: {e}");
                None
            }
        }
    }

    fn write_snapshot(&self, record: &UserRecord) {
        match serde_json::to_value(record) {
            Ok(v) => self.snapshot.write(&user_key(&record.chat_identity), v),
            Err(e) => tracing::warn!(chat = %record.chat_identity, "cannot snapshot user: {e}"),
        }
    }
}
