//! Shared fixtures for handler tests.

use std::{path::PathBuf, sync::Arc, time::Duration};

use gtb_core::{
    accounts::AccountDirectory,
    config::Config,
    domain::ChatIdentity,
    gateway::{GatewayConfig, RepositoryGateway},
    hosting::{fake::FakeHosting, HostingApi},
    linkage::LinkageService,
    messaging::port::{fake::FakeMessenger, MessagingPort},
    snapshot::SnapshotStore,
    store::{MemoryUserStore, UserStore},
};

use crate::router::AppState;

pub(crate) struct Fixture {
    pub(crate) state: Arc<AppState>,
    pub(crate) hosting: Arc<FakeHosting>,
    pub(crate) messenger: Arc<FakeMessenger>,
}

fn tmp_path(prefix: &str) -> PathBuf {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    PathBuf::from(format!("/tmp/{prefix}-{}-{ts}.json", std::process::id()))
}

pub(crate) fn config(snapshot_file: PathBuf) -> Config {
    Config {
        telegram_bot_token: "123:abc".to_string(),
        telegram_safe_limit: 4000,
        github_client_id: "cid".to_string(),
        github_client_secret: "secret".to_string(),
        github_redirect_uri: "http://localhost:3000/auth/github/callback".to_string(),
        github_scopes: vec!["repo".to_string()],
        github_api_base: "https://api.github.test".to_string(),
        github_oauth_base: "https://github.test".to_string(),
        github_timeout: Duration::from_secs(5),
        database_url: "sqlite::memory:".to_string(),
        snapshot_file,
        public_base_url: "http://localhost:3000".to_string(),
        http_bind: "127.0.0.1:0".parse().unwrap(),
        repo_cache_ttl: Duration::from_secs(300),
        invalidate_repo_cache_on_create: true,
    }
}

pub(crate) fn fixture(prefix: &str) -> Fixture {
    let cfg = config(tmp_path(prefix));
    let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let snapshot = Arc::new(SnapshotStore::new(cfg.snapshot_file.clone()));
    let accounts = Arc::new(AccountDirectory::new(store, snapshot));
    let hosting = Arc::new(FakeHosting::new("gho_test"));
    let messenger = Arc::new(FakeMessenger::default());

    let hosting_port: Arc<dyn HostingApi> = hosting.clone();
    let messenger_port: Arc<dyn MessagingPort> = messenger.clone();
    let linkage = Arc::new(LinkageService::new(accounts.clone(), hosting_port.clone()));
    let gateway = Arc::new(RepositoryGateway::new(
        accounts.clone(),
        hosting_port,
        GatewayConfig::default(),
    ));

    let state = Arc::new(AppState {
        cfg: Arc::new(cfg),
        accounts,
        linkage,
        gateway,
        messenger: messenger_port,
    });
    Fixture {
        state,
        hosting,
        messenger,
    }
}

impl Fixture {
    /// Run the OAuth completion for `chat` so it ends up linked.
    pub(crate) async fn link(&self, chat: &ChatIdentity) {
        self.state
            .linkage
            .complete_authorization("good", chat)
            .await
            .unwrap();
    }

    pub(crate) fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.state.cfg.snapshot_file);
    }
}
