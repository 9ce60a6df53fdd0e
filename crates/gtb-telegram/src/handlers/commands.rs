use gtb_core::{domain::ChatIdentity, formatting::escape_html, Result};

use crate::{
    render::{self, Reply},
    router::AppState,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Start,
    Help,
    Link,
    Status,
    Repos,
    Create {
        name: String,
        description: String,
        private: bool,
    },
    Delete {
        target: String,
        confirmed: bool,
    },
    Ls {
        repo: String,
        path: String,
    },
    Unknown(String),
}

fn split_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub(crate) fn parse(text: &str) -> Command {
    let (cmd, args) = split_command(text);
    match cmd.as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "link" => Command::Link,
        "status" => Command::Status,
        "repos" => Command::Repos,
        "create" => parse_create(&args),
        "delete" => {
            let mut target = String::new();
            let mut confirmed = false;
            for tok in args.split_whitespace() {
                match tok {
                    "--yes" | "-y" => confirmed = true,
                    _ if target.is_empty() => target = tok.to_string(),
                    _ => {}
                }
            }
            Command::Delete { target, confirmed }
        }
        "ls" => {
            let mut toks = args.split_whitespace();
            Command::Ls {
                repo: toks.next().unwrap_or("").to_string(),
                path: toks.next().unwrap_or("").to_string(),
            }
        }
        other => Command::Unknown(other.to_string()),
    }
}

/// `<name> [--private|-p] [description...]`; the flag may appear anywhere.
fn parse_create(args: &str) -> Command {
    let mut name = String::new();
    let mut private = false;
    let mut words = Vec::new();
    for tok in args.split_whitespace() {
        match tok {
            "--private" | "-p" => private = true,
            _ if name.is_empty() => name = tok.to_string(),
            _ => words.push(tok),
        }
    }
    Command::Create {
        name,
        description: words.join(" "),
        private,
    }
}

pub(crate) async fn handle_command(state: &AppState, chat: &ChatIdentity, text: &str) -> Reply {
    execute(state, chat, parse(text)).await
}

pub(crate) async fn execute(state: &AppState, chat: &ChatIdentity, cmd: Command) -> Reply {
    match run(state, chat, cmd).await {
        Ok(reply) => reply,
        Err(e) => {
            if !e.is_user_error() {
                tracing::warn!(%chat, "command failed: {e}");
            }
            render::error(&e)
        }
    }
}

async fn run(state: &AppState, chat: &ChatIdentity, cmd: Command) -> Result<Reply> {
    match cmd {
        Command::Start => start(state, chat).await,
        Command::Help => Ok(render::help()),
        Command::Link => link(state, chat).await,
        Command::Status => {
            let linkage = state.linkage.linkage_state(chat).await?;
            let user = state.accounts.get_user(chat).await?;
            Ok(render::status(linkage, user.as_ref()))
        }
        Command::Repos => {
            let repos = state.gateway.list_repositories(chat).await?;
            Ok(render::repo_list(&repos))
        }
        Command::Create {
            name,
            description,
            private,
        } => {
            if name.is_empty() {
                return Ok(Reply::text(
                    "Usage: <code>/create &lt;name&gt; [--private] [description]</code>",
                ));
            }
            let repo = state
                .gateway
                .create_repository(chat, &name, &description, private)
                .await?;
            Ok(render::created(&repo))
        }
        Command::Delete { target, confirmed } => {
            if target.is_empty() {
                return Ok(Reply::text("Usage: <code>/delete &lt;owner/name&gt;</code>"));
            }
            if confirmed {
                let full_name = state.gateway.delete_repository(chat, &target).await?;
                return Ok(render::deleted(&full_name));
            }
            state.accounts.require_linked(chat).await?;
            Ok(render::confirm_delete(&target))
        }
        Command::Ls { repo, path } => {
            if repo.is_empty() {
                return Ok(Reply::text("Usage: <code>/ls &lt;owner/name&gt; [path]</code>"));
            }
            let (full_name, entries) = state.gateway.list_contents(chat, &repo, &path).await?;
            Ok(render::contents(&full_name, &path, &entries))
        }
        Command::Unknown(name) => Ok(Reply::text(format!(
            "Unknown command /{}. Send /help to see what I can do.",
            escape_html(&name)
        ))),
    }
}

/// Terms for newcomers, the menu for everyone else.
pub(crate) async fn start(state: &AppState, chat: &ChatIdentity) -> Result<Reply> {
    match state.accounts.get_user(chat).await? {
        Some(user) if user.has_agreed_to_terms => {
            let login = user
                .hosting_username
                .as_deref()
                .filter(|_| user.is_linked());
            Ok(render::main_menu(login))
        }
        _ => Ok(render::terms()),
    }
}

async fn link(state: &AppState, chat: &ChatIdentity) -> Result<Reply> {
    let agreed = state
        .accounts
        .get_user(chat)
        .await?
        .map(|u| u.has_agreed_to_terms)
        .unwrap_or(false);
    if !agreed {
        return Ok(render::terms());
    }
    let url = state.linkage.begin_authorization(chat)?;
    Ok(render::link_prompt(&url))
}
