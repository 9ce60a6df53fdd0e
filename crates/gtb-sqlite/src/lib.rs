//! SQLite durable store (sqlx).
//!
//! Implements the `gtb-core` `UserStore` port. One row per chat identity; the
//! denormalized repository list is kept as JSON text and timestamps as RFC3339.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};

use gtb_core::{
    domain::ChatIdentity,
    errors::Error,
    model::{RepoSummary, UserRecord},
    store::UserStore,
    Result,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    chat_identity       TEXT PRIMARY KEY NOT NULL,
    hosting_identity    TEXT,
    hosting_token       TEXT,
    hosting_username    TEXT,
    has_agreed_to_terms INTEGER NOT NULL DEFAULT 0,
    is_linked           INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,
    last_active_at      TEXT NOT NULL,
    repositories        TEXT NOT NULL DEFAULT '[]'
)
"#;

#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Open (creating if needed) the database at `database_url` and ensure the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::Config(format!("invalid DATABASE_URL: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let in_memory = database_url.contains(":memory:");
        let opts = if in_memory {
            opts
        } else {
            if let Some(parent) = opts.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            opts.journal_mode(SqliteJournalMode::Wal)
        };

        // Every in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(opts)
            .await
            .map_err(|e| Error::StoreRead(format!("connect failed: {e}")))?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::StoreWrite(format!("schema setup failed: {e}")))?;
        tracing::debug!("users table ready");
        Ok(Self { pool })
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct UserRow {
    chat_identity: String,
    hosting_identity: Option<String>,
    hosting_token: Option<String>,
    hosting_username: Option<String>,
    has_agreed_to_terms: bool,
    created_at: String,
    last_active_at: String,
    repositories: String,
}

impl UserRow {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            chat_identity: row.try_get("chat_identity")?,
            hosting_identity: row.try_get("hosting_identity")?,
            hosting_token: row.try_get("hosting_token")?,
            hosting_username: row.try_get("hosting_username")?,
            has_agreed_to_terms: row.try_get("has_agreed_to_terms")?,
            created_at: row.try_get("created_at")?,
            last_active_at: row.try_get("last_active_at")?,
            repositories: row.try_get("repositories")?,
        })
    }

    fn into_record(self) -> Result<UserRecord> {
        let repositories: Vec<RepoSummary> = serde_json::from_str(&self.repositories)
            .map_err(|e| Error::StoreRead(format!("invalid repositories JSON: {e}")))?;
        Ok(UserRecord::from_parts(
            ChatIdentity::new(self.chat_identity),
            self.hosting_identity,
            self.hosting_token,
            self.hosting_username,
            self.has_agreed_to_terms,
            parse_datetime(&self.created_at)?,
            parse_datetime(&self.last_active_at)?,
            repositories,
        ))
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::StoreRead(format!("invalid datetime {s:?}: {e}")))
}

// ---------------------------------------------------------------------------
// UserStore implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find(&self, chat: &ChatIdentity) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            r#"SELECT chat_identity, hosting_identity, hosting_token, hosting_username,
                      has_agreed_to_terms, created_at, last_active_at, repositories
               FROM users WHERE chat_identity = ?"#,
        )
        .bind(chat.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::StoreRead(e.to_string()))?;

        match row {
            Some(row) => {
                let row = UserRow::from_row(&row).map_err(|e| Error::StoreRead(e.to_string()))?;
                Ok(Some(row.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, record: &UserRecord) -> Result<()> {
        let repositories = serde_json::to_string(&record.repositories)
            .map_err(|e| Error::StoreWrite(format!("failed to serialize repositories: {e}")))?;

        sqlx::query(
            r#"INSERT INTO users (chat_identity, hosting_identity, hosting_token, hosting_username,
                                  has_agreed_to_terms, is_linked, created_at, last_active_at, repositories)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (chat_identity) DO UPDATE SET
                   hosting_identity = excluded.hosting_identity,
                   hosting_token = excluded.hosting_token,
                   hosting_username = excluded.hosting_username,
                   has_agreed_to_terms = excluded.has_agreed_to_terms,
                   is_linked = excluded.is_linked,
                   last_active_at = excluded.last_active_at,
                   repositories = excluded.repositories"#,
        )
        .bind(record.chat_identity.as_str())
        .bind(record.hosting_identity.as_deref())
        .bind(record.token())
        .bind(record.hosting_username.as_deref())
        .bind(record.has_agreed_to_terms)
        .bind(record.is_linked())
        .bind(record.created_at.to_rfc3339())
        .bind(record.last_active_at.to_rfc3339())
        .bind(repositories)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::StoreWrite(e.to_string()))?;

        Ok(())
    }

    async fn set_repositories(&self, chat: &ChatIdentity, repos: &[RepoSummary]) -> Result<()> {
        let repositories = serde_json::to_string(repos)
            .map_err(|e| Error::StoreWrite(format!("failed to serialize repositories: {e}")))?;

        sqlx::query("UPDATE users SET repositories = ? WHERE chat_identity = ?")
            .bind(repositories)
            .bind(chat.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::StoreWrite(e.to_string()))?;
        Ok(())
    }

    async fn touch(&self, chat: &ChatIdentity, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_active_at = ? WHERE chat_identity = ?")
            .bind(at.to_rfc3339())
            .bind(chat.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::StoreWrite(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtb_core::model::{HostingProfile, Repository};

    async fn memory_store() -> SqliteUserStore {
        SqliteUserStore::connect("sqlite::memory:").await.unwrap()
    }

    fn repo(name: &str, private: bool) -> Repository {
        Repository {
            name: name.to_string(),
            full_name: format!("octocat/{name}"),
            html_url: format!("https://github.com/octocat/{name}"),
            private,
            description: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let store = memory_store().await;
        assert!(store
            .find(&ChatIdentity::new("nobody"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn linked_record_survives_storage() {
        let store = memory_store().await;
        let chat = ChatIdentity::new("123");
        let now = Utc::now();

        let mut u = UserRecord::new(chat.clone(), now);
        u.has_agreed_to_terms = true;
        u.link(
            &HostingProfile {
                id: 9,
                login: "octocat".to_string(),
                name: None,
            },
            "gho_x".to_string(),
            now,
        );
        u.set_repositories(&[repo("a", false), repo("b", true)]);
        store.upsert(&u).await.unwrap();

        let got = store.find(&chat).await.unwrap().unwrap();
        assert!(got.is_linked());
        assert_eq!(got.token(), Some("gho_x"));
        assert_eq!(got.hosting_identity.as_deref(), Some("9"));
        assert!(got.has_agreed_to_terms);
        assert_eq!(got.repositories.len(), 2);
        assert!(got.repositories[1].is_private);
        assert_eq!(got.created_at.timestamp(), now.timestamp());
    }

    #[tokio::test]
    async fn upsert_updates_in_place_and_keeps_created_at() {
        let store = memory_store().await;
        let chat = ChatIdentity::new("124");
        let t0 = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        store.upsert(&UserRecord::new(chat.clone(), t0)).await.unwrap();

        let mut later = UserRecord::new(chat.clone(), Utc::now());
        later.has_agreed_to_terms = true;
        store.upsert(&later).await.unwrap();

        let got = store.find(&chat).await.unwrap().unwrap();
        assert!(got.has_agreed_to_terms);
        assert_eq!(got.created_at, t0);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn blank_token_column_reads_as_unlinked() {
        let store = memory_store().await;
        sqlx::query(
            "INSERT INTO users (chat_identity, hosting_token, is_linked, created_at, last_active_at) VALUES ('5', '', 1, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let got = store.find(&ChatIdentity::new("5")).await.unwrap().unwrap();
        assert!(!got.is_linked());
        assert_eq!(got.token(), None);
    }

    #[tokio::test]
    async fn field_updates_do_not_touch_the_token() {
        let store = memory_store().await;
        let chat = ChatIdentity::new("125");
        let t0 = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let mut u = UserRecord::new(chat.clone(), t0);
        u.link(
            &HostingProfile {
                id: 9,
                login: "octocat".to_string(),
                name: None,
            },
            "gho_NEW".to_string(),
            t0,
        );
        store.upsert(&u).await.unwrap();

        let mut stale = u.clone();
        stale.set_repositories(&[repo("a", false)]);
        store
            .set_repositories(&chat, &stale.repositories)
            .await
            .unwrap();
        let t1 = t0 + chrono::Duration::minutes(5);
        store.touch(&chat, t1).await.unwrap();

        let got = store.find(&chat).await.unwrap().unwrap();
        assert_eq!(got.token(), Some("gho_NEW"));
        assert_eq!(got.repositories.len(), 1);
        assert_eq!(got.last_active_at, t1);
        assert_eq!(got.created_at, t0);

        store.touch(&ChatIdentity::new("ghost"), t1).await.unwrap();
        assert!(store
            .find(&ChatIdentity::new("ghost"))
            .await
            .unwrap()
            .is_none());
    }
}
