//! Durable store port.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::ChatIdentity,
    errors::Error,
    model::{RepoSummary, UserRecord},
    Result,
};

/// Authoritative per-chat user records, keyed by exact chat identity.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, chat: &ChatIdentity) -> Result<Option<UserRecord>>;

    /// Insert or replace the record with the same chat identity.
    async fn upsert(&self, record: &UserRecord) -> Result<()>;

    /// Replace only the repository mirror. No-op for unknown chats.
    async fn set_repositories(&self, chat: &ChatIdentity, repos: &[RepoSummary]) -> Result<()>;

    /// Update only `last_active_at`. No-op for unknown chats.
    async fn touch(&self, chat: &ChatIdentity, at: DateTime<Utc>) -> Result<()>;
}

/// In-process store for tests, with read counting and failure injection.
#[derive(Default)]
pub struct MemoryUserStore {
    records: Mutex<HashMap<ChatIdentity, UserRecord>>,
    reads: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent `find` fail, simulating an unreachable database.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find(&self, chat: &ChatIdentity) -> Result<Option<UserRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::StoreRead("memory store unavailable".to_string()));
        }
        let map = self
            .records
            .lock()
            .map_err(|_| Error::StoreRead("memory store poisoned".to_string()))?;
        Ok(map.get(chat).cloned())
    }

    async fn upsert(&self, record: &UserRecord) -> Result<()> {
        let mut map = self
            .records
            .lock()
            .map_err(|_| Error::StoreWrite("memory store poisoned".to_string()))?;
        map.insert(record.chat_identity.clone(), record.clone());
        Ok(())
    }

    async fn set_repositories(&self, chat: &ChatIdentity, repos: &[RepoSummary]) -> Result<()> {
        let mut map = self
            .records
            .lock()
            .map_err(|_| Error::StoreWrite("memory store poisoned".to_string()))?;
        if let Some(record) = map.get_mut(chat) {
            record.repositories = repos.to_vec();
        }
        Ok(())
    }

    async fn touch(&self, chat: &ChatIdentity, at: DateTime<Utc>) -> Result<()> {
        let mut map = self
            .records
            .lock()
            .map_err(|_| Error::StoreWrite("memory store poisoned".to_string()))?;
        if let Some(record) = map.get_mut(chat) {
            record.last_active_at = at;
        }
        Ok(())
    }
}
