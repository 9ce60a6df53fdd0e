//! Single-file JSON snapshot used as a read-through cache in front of the
//! durable store.
//!
//! The whole file is one JSON object. Every write re-reads the file, merges the
//! one key, stamps `lastUpdated` and rewrites the file. There is no locking:
//! concurrent writers race and the last write wins. Failures never reach the
//! caller; a failed read is a cache miss and a failed write is logged.
//!
//! User entries carry bearer tokens, so the file is kept owner-only (0600).

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};

use crate::{domain::ChatIdentity, utils::iso_timestamp_utc};

const LAST_UPDATED: &str = "lastUpdated";

pub fn user_key(chat: &ChatIdentity) -> String {
    format!("user_{chat}")
}

pub fn repos_key(chat: &ChatIdentity) -> String {
    format!("repos_{chat}")
}

pub fn oauth_key(chat: &ChatIdentity) -> String {
    format!("oauth_{chat}")
}

#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self, key: &str) -> Option<Value> {
        if key == LAST_UPDATED {
            return None;
        }
        let mut map = self.load()?;
        map.remove(key).filter(|v| !v.is_null())
    }

    pub fn write(&self, key: &str, value: Value) {
        self.update(key, Some(value));
    }

    pub fn remove(&self, key: &str) {
        self.update(key, None);
    }

    fn update(&self, key: &str, value: Option<Value>) {
        // A malformed file is replaced by a fresh object.
        let mut map = self.load().unwrap_or_default();
        match value {
            Some(v) => {
                map.insert(key.to_string(), v);
            }
            None => {
                if map.remove(key).is_none() {
                    return;
                }
            }
        }
        map.insert(
            LAST_UPDATED.to_string(),
            Value::String(iso_timestamp_utc()),
        );

        if let Err(e) = self.save(&map) {
            tracing::warn!(path = %self.path.display(), key, "snapshot write failed: {e}");
        }
    }

    fn load(&self) -> Option<Map<String, Value>> {
        let txt = match std::fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "snapshot read failed: {e}");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&txt) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "snapshot is not a JSON object");
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "snapshot is malformed: {e}");
                None
            }
        }
    }

    fn save(&self, map: &Map<String, Value>) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let txt = serde_json::to_string_pretty(map)?;

        let mut opts = OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(&self.path)?;
        // `mode` only applies when the file is created.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(txt.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn tmp_path(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.json"))
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let store = SnapshotStore::new(tmp_path("gtb-snap-missing"));
        assert_eq!(store.read("user_1"), None);
    }

    #[test]
    fn write_merges_keys_and_stamps_last_updated() {
        let path = tmp_path("gtb-snap-merge");
        let store = SnapshotStore::new(&path);

        store.write("user_1", json!({ "a": 1 }));
        store.write("repos_1", json!({ "data": [], "cachedAt": 5 }));

        assert_eq!(store.read("user_1"), Some(json!({ "a": 1 })));
        assert_eq!(
            store.read("repos_1"),
            Some(json!({ "data": [], "cachedAt": 5 }))
        );

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("lastUpdated").and_then(|v| v.as_str()).is_some());
        assert_eq!(store.read("lastUpdated"), None);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn remove_drops_only_that_key() {
        let path = tmp_path("gtb-snap-remove");
        let store = SnapshotStore::new(&path);

        store.write("user_1", json!(1));
        store.write("repos_1", json!(2));
        store.remove("repos_1");

        assert_eq!(store.read("repos_1"), None);
        assert_eq!(store.read("user_1"), Some(json!(1)));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_file_is_a_miss_and_is_replaced_on_write() {
        let path = tmp_path("gtb-snap-corrupt");
        std::fs::write(&path, "{not json").unwrap();
        let store = SnapshotStore::new(&path);

        assert_eq!(store.read("user_1"), None);

        store.write("user_1", json!("ok"));
        assert_eq!(store.read("user_1"), Some(json!("ok")));

        let _ = std::fs::remove_file(&path);
    }

    #[cfg(unix)]
    #[test]
    fn snapshot_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let path = tmp_path("gtb-snap-mode");
        let store = SnapshotStore::new(&path);
        store.write("user_1", json!({ "hostingToken": "gho_secret" }));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // A file left world-readable by an earlier run is tightened on the next write.
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        store.write("user_2", json!({}));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn keys_are_prefixed_by_kind() {
        let chat = ChatIdentity::new("99");
        assert_eq!(user_key(&chat), "user_99");
        assert_eq!(repos_key(&chat), "repos_99");
        assert_eq!(oauth_key(&chat), "oauth_99");
    }
}
