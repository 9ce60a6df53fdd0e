//! Reply templates. Pure functions so they can be tested without Telegram.

use gtb_core::{
    errors::Error,
    formatting::escape_html,
    linkage::LinkageState,
    messaging::types::{InlineButton, InlineKeyboard},
    model::{ContentKind, RepoContent, Repository, UserRecord},
    utils::truncate_chars,
};

pub const CB_AGREE: &str = "terms:agree";
pub const CB_LINK: &str = "menu:link";
pub const CB_REPOS: &str = "menu:repos";
pub const CB_STATUS: &str = "menu:status";
pub const CB_CANCEL: &str = "cancel";
pub const CB_DELETE_PREFIX: &str = "del:";

/// Telegram rejects callback data longer than this.
pub const MAX_CALLBACK_DATA: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub html: String,
    pub keyboard: Option<InlineKeyboard>,
}

impl Reply {
    pub fn text(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

pub fn terms() -> Reply {
    Reply::text(
        "👋 <b>Welcome!</b>\n\n\
This bot manages your GitHub repositories from Telegram.\n\n\
By continuing you agree that:\n\
• your GitHub access token is stored to act on your behalf\n\
• the bot can list, create and delete repositories you own\n\
• you can revoke access at any time from GitHub settings",
    )
    .with_keyboard(InlineKeyboard::one_per_row(vec![InlineButton::callback(
        "✅ I agree",
        CB_AGREE,
    )]))
}

pub fn help() -> Reply {
    Reply::text(
        "<b>Commands</b>\n\n\
/link - connect your GitHub account\n\
/status - show linkage status\n\
/repos - list your repositories\n\
/create &lt;name&gt; [--private] [description] - create a repository\n\
/delete &lt;owner/name&gt; - delete a repository\n\
/ls &lt;owner/name&gt; [path] - browse repository files\n\
/help - this message",
    )
}

pub fn main_menu(username: Option<&str>) -> Reply {
    let greeting = match username {
        Some(login) => format!("Linked as <b>{}</b>.", escape_html(login)),
        None => "Your GitHub account is not linked yet.".to_string(),
    };
    Reply::text(format!("{greeting}\n\nWhat would you like to do?")).with_keyboard(
        InlineKeyboard::new(vec![
            vec![
                InlineButton::callback("📚 Repositories", CB_REPOS),
                InlineButton::callback("ℹ️ Status", CB_STATUS),
            ],
            vec![InlineButton::callback("🔗 Link GitHub", CB_LINK)],
        ]),
    )
}

pub fn link_prompt(url: &str) -> Reply {
    Reply::text(
        "🔗 <b>Connect GitHub</b>\n\nOpen the link below and approve access. \
You will get a message here once the account is linked.",
    )
    .with_keyboard(InlineKeyboard::one_per_row(vec![InlineButton::url(
        "Connect GitHub",
        url,
    )]))
}

pub fn status(state: LinkageState, user: Option<&UserRecord>) -> Reply {
    let mut out = String::from("<b>Status</b>\n\n");
    match state {
        LinkageState::Linked => {
            let login = user
                .and_then(|u| u.hosting_username.as_deref())
                .unwrap_or("unknown");
            out.push_str(&format!("🟢 Linked as <b>{}</b>", escape_html(login)));
        }
        LinkageState::AuthorizationPending => {
            out.push_str("🟡 Authorization started, waiting for GitHub approval");
        }
        LinkageState::Unlinked => out.push_str("⚪ Not linked. Use /link"),
    }
    if let Some(u) = user {
        out.push_str(&format!(
            "\nTerms accepted: {}",
            if u.has_agreed_to_terms { "yes" } else { "no" }
        ));
        if !u.repositories.is_empty() {
            out.push_str(&format!("\nKnown repositories: {}", u.repositories.len()));
        }
        out.push_str(&format!(
            "\nLast active: {}",
            u.last_active_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    Reply::text(out)
}

pub fn repo_list(repos: &[Repository]) -> Reply {
    if repos.is_empty() {
        return Reply::text("You have no repositories yet. Create one with /create &lt;name&gt;");
    }
    let mut out = format!("📚 <b>Your repositories</b> ({})\n\n", repos.len());
    for r in repos {
        let lock = if r.private { "🔒" } else { "📖" };
        out.push_str(&format!(
            "{lock} <a href=\"{}\">{}</a>",
            escape_html(&r.html_url),
            escape_html(&r.full_name)
        ));
        if let Some(d) = r.description.as_deref().filter(|d| !d.trim().is_empty()) {
            out.push_str(&format!(" - {}", escape_html(&truncate_chars(d, 80))));
        }
        out.push('\n');
    }
    Reply::text(out)
}

pub fn created(repo: &Repository) -> Reply {
    let visibility = if repo.private { "private" } else { "public" };
    Reply::text(format!(
        "✅ Created {visibility} repository <a href=\"{}\">{}</a>",
        escape_html(&repo.html_url),
        escape_html(&repo.full_name)
    ))
}

pub fn confirm_delete(full_name: &str) -> Reply {
    let text = format!(
        "⚠️ Delete <b>{}</b>? This cannot be undone.",
        escape_html(full_name)
    );
    let data = format!("{CB_DELETE_PREFIX}{full_name}");
    if data.len() > MAX_CALLBACK_DATA {
        return Reply::text(format!(
            "{text}\n\nConfirm with <code>/delete {} --yes</code>",
            escape_html(full_name)
        ));
    }
    Reply::text(text).with_keyboard(InlineKeyboard::new(vec![vec![
        InlineButton::callback("🗑 Delete", data),
        InlineButton::callback("Cancel", CB_CANCEL),
    ]]))
}

pub fn deleted(full_name: &str) -> Reply {
    Reply::text(format!("🗑 Deleted <b>{}</b>", escape_html(full_name)))
}

pub fn contents(full_name: &str, path: &str, entries: &[RepoContent]) -> Reply {
    let location = if path.trim_matches('/').is_empty() {
        full_name.to_string()
    } else {
        format!("{full_name}/{}", path.trim_matches('/'))
    };
    if entries.is_empty() {
        return Reply::text(format!("📂 <b>{}</b> is empty", escape_html(&location)));
    }
    let mut out = format!("📂 <b>{}</b>\n\n", escape_html(&location));
    for e in entries {
        let line = match e.kind {
            ContentKind::Dir => format!("📁 {}/", escape_html(&e.name)),
            ContentKind::File => format!("📄 {} ({} B)", escape_html(&e.name), e.size),
            ContentKind::Symlink => format!("🔗 {}", escape_html(&e.name)),
            ContentKind::Submodule => format!("📦 {}", escape_html(&e.name)),
            ContentKind::Other => escape_html(&e.name),
        };
        out.push_str(&line);
        out.push('\n');
    }
    Reply::text(out)
}

pub fn error(err: &Error) -> Reply {
    match err {
        Error::Unauthenticated => Reply::text(
            "🔒 Your GitHub account is not linked yet. Use /link to connect it.",
        )
        .with_keyboard(InlineKeyboard::one_per_row(vec![InlineButton::callback(
            "🔗 Link GitHub",
            CB_LINK,
        )])),
        Error::MissingParameter(what) => Reply::text(format!(
            "Missing {}. See /help for usage.",
            escape_html(what)
        )),
        other => Reply::text(format!(
            "❌ Error: {}",
            escape_html(&truncate_chars(&other.to_string(), 200))
        )),
    }
}
