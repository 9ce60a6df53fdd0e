use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};

use gtb_core::{
    accounts::AccountDirectory, config::Config, gateway::RepositoryGateway,
    linkage::LinkageService, messaging::port::MessagingPort,
};

use crate::handlers;

/// Services shared by every update handler.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub accounts: Arc<AccountDirectory>,
    pub linkage: Arc<LinkageService>,
    pub gateway: Arc<RepositoryGateway>,
    pub messenger: Arc<dyn MessagingPort>,
}

fn bot_commands() -> Vec<BotCommand> {
    [
        ("start", "Accept the terms and open the menu"),
        ("link", "Connect your GitHub account"),
        ("status", "Show linkage status"),
        ("repos", "List your repositories"),
        ("create", "Create a repository"),
        ("delete", "Delete a repository"),
        ("ls", "Browse repository files"),
        ("help", "Show help"),
    ]
    .into_iter()
    .map(|(cmd, desc)| BotCommand::new(cmd, desc))
    .collect()
}

/// Long-poll Telegram until the process is stopped.
pub async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "telegram bot started"),
        Err(e) => tracing::warn!("get_me failed: {e}"),
    }

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        tracing::warn!("failed to register bot commands: {e}");
    }

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
