use std::sync::Arc;

use teloxide::Bot;

use gtb_core::{
    accounts::AccountDirectory,
    config::Config,
    gateway::RepositoryGateway,
    hosting::HostingApi,
    linkage::LinkageService,
    messaging::port::MessagingPort,
    snapshot::SnapshotStore,
    store::UserStore,
};
use gtb_github::{GitHubClient, GitHubConfig};
use gtb_http::HttpState;
use gtb_sqlite::SqliteUserStore;
use gtb_telegram::{router::AppState, TelegramMessenger};

#[tokio::main]
async fn main() -> Result<(), gtb_core::Error> {
    gtb_core::logging::init("gtb")?;

    let cfg = Arc::new(Config::load()?);

    let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::connect(&cfg.database_url).await?);
    let snapshot = Arc::new(SnapshotStore::new(cfg.snapshot_file.clone()));
    tracing::info!(path = %snapshot.path().display(), "snapshot file");
    let accounts = Arc::new(AccountDirectory::new(store, snapshot));

    let hosting: Arc<dyn HostingApi> =
        Arc::new(GitHubClient::new(GitHubConfig::from_config(&cfg))?);

    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let linkage = Arc::new(
        LinkageService::new(accounts.clone(), hosting.clone()).with_notifier(messenger.clone()),
    );
    let gateway = Arc::new(RepositoryGateway::new(
        accounts.clone(),
        hosting,
        cfg.gateway(),
    ));

    let http_state = HttpState {
        linkage: linkage.clone(),
    };
    let app_state = Arc::new(AppState {
        cfg: cfg.clone(),
        accounts,
        linkage,
        gateway,
        messenger,
    });

    tracing::info!(
        bind = %cfg.http_bind,
        redirect_uri = %cfg.github_redirect_uri,
        "starting gtb"
    );

    tokio::select! {
        res = gtb_http::serve(cfg.http_bind, http_state) => {
            res.map_err(|e| gtb_core::Error::External(format!("callback server failed: {e}")))?;
        }
        res = gtb_telegram::router::run_polling(bot, app_state) => {
            res.map_err(|e| gtb_core::Error::External(format!("telegram bot failed: {e}")))?;
        }
    }

    Ok(())
}
