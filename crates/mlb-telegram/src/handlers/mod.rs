//! Telegram update handlers.
//!
//! Only slash commands do anything; everything else gets a one-line hint.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use mlb_core::domain::UserId;
use mlb_core::permission::is_authorized;

use crate::router::AppState;
mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| u.id.0);

    if !is_authorized(
        user_id.map(|id| UserId(id as i64)),
        &state.cfg.telegram_allowed_users,
    ) {
        tracing::info!(chat_id = msg.chat.id.0, ?user_id, "unauthorized sender");
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(bot, msg, state).await;
        }
        // Hint only in private chats.
        if msg.chat.is_private() {
            let _ = bot
                .send_message(msg.chat.id, "Send /help to see the available commands.")
                .await;
        }
    }

    Ok(())
}
