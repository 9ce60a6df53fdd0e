use std::sync::Arc;

use teloxide::{prelude::*, types::CallbackQuery};

use gtb_core::domain::{ChatId, ChatIdentity, MessageId, MessageRef};

use crate::{
    render::{self, Reply, CB_AGREE, CB_CANCEL, CB_DELETE_PREFIX, CB_LINK, CB_REPOS, CB_STATUS},
    router::AppState,
};

use super::{
    commands::{self, Command},
    send_reply,
};

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let data = q.data.clone().unwrap_or_default();
    let chat_id = q.message.as_ref().map(|m| ChatId(m.chat.id.0));

    // Always answer the query so the client stops spinning.
    let Some(chat_id) = chat_id.filter(|_| !data.is_empty()) else {
        if let Err(e) = state.messenger.answer_callback_query(&q.id, None).await {
            tracing::debug!("answer_callback_query failed: {e}");
        }
        return Ok(());
    };

    let chat = ChatIdentity::from(chat_id);
    state.accounts.touch(&chat).await;

    let (toast, reply) = dispatch(&state, &chat, &data).await;
    if let Err(e) = state.messenger.answer_callback_query(&q.id, toast).await {
        tracing::debug!("answer_callback_query failed: {e}");
    }
    let Some(reply) = reply else {
        return Ok(());
    };

    // Delete confirmations are resolved in place, which also drops their buttons.
    let origin = q.message.as_ref().map(|m| MessageRef {
        chat_id,
        message_id: MessageId(m.id.0),
    });
    match origin {
        Some(origin) if resolves_in_place(&state, &data, &reply) => {
            if let Err(e) = state.messenger.edit_html(origin, &reply.html).await {
                tracing::debug!("edit failed, sending instead: {e}");
                send_reply(&state, chat_id, reply).await;
            }
        }
        _ => send_reply(&state, chat_id, reply).await,
    }
    Ok(())
}

fn resolves_in_place(state: &AppState, data: &str, reply: &Reply) -> bool {
    (data == CB_CANCEL || data.starts_with(CB_DELETE_PREFIX))
        && reply.keyboard.is_none()
        && state.messenger.capabilities().supports_edit
}

/// Map callback data to an optional toast and an optional chat reply.
pub(crate) async fn dispatch(
    state: &AppState,
    chat: &ChatIdentity,
    data: &str,
) -> (Option<&'static str>, Option<Reply>) {
    match data {
        CB_AGREE => match state.accounts.agree_to_terms(chat).await {
            Ok(_) => match commands::start(state, chat).await {
                Ok(menu) => (Some("Thanks!"), Some(menu)),
                Err(e) => (None, Some(render::error(&e))),
            },
            Err(e) => {
                tracing::warn!(%chat, "failed to record terms agreement: {e}");
                (None, Some(render::error(&e)))
            }
        },
        CB_REPOS => (None, Some(commands::execute(state, chat, Command::Repos).await)),
        CB_LINK => (None, Some(commands::execute(state, chat, Command::Link).await)),
        CB_STATUS => (None, Some(commands::execute(state, chat, Command::Status).await)),
        CB_CANCEL => (Some("Cancelled"), Some(Reply::text("Cancelled."))),
        _ => match data.strip_prefix(CB_DELETE_PREFIX) {
            Some(target) if !target.is_empty() => {
                let cmd = Command::Delete {
                    target: target.to_string(),
                    confirmed: true,
                };
                (None, Some(commands::execute(state, chat, cmd).await))
            }
            _ => (Some("Unknown action"), None),
        },
    }
}
