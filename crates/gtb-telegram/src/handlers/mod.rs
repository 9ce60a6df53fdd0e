//! Telegram update handlers.
//!
//! Handlers turn an update into a [`Reply`] through the core services and hand
//! it to the messenger. Failures are rendered for the user, never propagated to
//! the dispatcher.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use gtb_core::{
    domain::{ChatId, ChatIdentity},
    formatting::split_message,
};

use crate::{render::Reply, router::AppState};

mod callback;
mod commands;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    callback::handle_callback(q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = ChatId(msg.chat.id.0);
    let chat = ChatIdentity::from(chat_id);

    let Some(text) = msg.text() else {
        return Ok(());
    };

    state.accounts.touch(&chat).await;

    let reply = if text.starts_with('/') {
        commands::handle_command(&state, &chat, text).await
    } else {
        Reply::text("I only understand commands. Send /help to see them.")
    };
    send_reply(&state, chat_id, reply).await;
    Ok(())
}

/// Deliver a reply: keyboards go out as a single message, plain text is chunked.
pub(crate) async fn send_reply(state: &AppState, chat_id: ChatId, reply: Reply) {
    let limit = state
        .cfg
        .telegram_safe_limit
        .clamp(200, state.messenger.capabilities().max_message_len);

    if let Some(keyboard) = reply.keyboard.filter(|k| !k.is_empty()) {
        if let Err(e) = state
            .messenger
            .send_inline_keyboard(chat_id, &reply.html, keyboard)
            .await
        {
            tracing::warn!(chat = chat_id.0, "failed to send reply: {e}");
        }
        return;
    }

    for chunk in split_message(&reply.html, limit) {
        if let Err(e) = state.messenger.send_html(chat_id, &chunk).await {
            tracing::warn!(chat = chat_id.0, "failed to send reply: {e}");
            break;
        }
    }
}
