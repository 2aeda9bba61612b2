use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, warn};

use mlb_core::{
    domain::{ChatId, MessageId},
    formatting::escape_html,
    messaging::types::{ChatAction, Reply},
};

use crate::chunks::{split_html, split_text};
use crate::router::AppState;

const NO_USERNAME: &str =
    "❌ Set a Telegram username first; it is how the bot finds your mailing-list address.";
const UNKNOWN_COMMAND: &str = "Unknown command. Send /help for the list.";

/// Split `/cmd@botname args` into `("cmd", "args")`; case is preserved.
fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_string();

    (cmd, rest)
}

/// Telegram rendering of a reply: HTML replies get their text as a bold heading.
fn render(reply: &Reply) -> (String, bool) {
    match &reply.html {
        Some(html) => (format!("<b>{}</b>\n\n{html}", escape_html(&reply.text)), true),
        None => (reply.text.clone(), false),
    }
}

async fn deliver(state: &AppState, chat_id: ChatId, trigger: MessageId, reply: &Reply) {
    let caps = state.messenger.capabilities();
    let limit = state.cfg.telegram_safe_limit.clamp(200, caps.max_message_len);
    let (body, is_html) = if caps.supports_html {
        render(reply)
    } else {
        (reply.text.clone(), false)
    };
    let mut reply_to = (reply.quote && caps.supports_quotes).then_some(trigger);

    let chunks = if is_html {
        split_html(&body, limit)
    } else {
        split_text(&body, limit)
    };
    for chunk in chunks {
        let sent = if is_html {
            state.messenger.send_html(chat_id, &chunk, reply_to).await
        } else {
            state.messenger.send_text(chat_id, &chunk, reply_to).await
        };
        if let Err(e) = sent {
            warn!(chat_id = chat_id.0, error = %e, "failed to deliver reply");
            return;
        }
        // Only the first chunk quotes the command.
        reply_to = None;
    }
}

pub async fn handle_command(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let chat_id = ChatId(msg.chat.id.0);
    let trigger = MessageId(msg.id.0);
    let (cmd, args) = parse_command(text);
    if cmd.is_empty() {
        return Ok(());
    }

    let Some(username) = user.username.as_deref() else {
        debug!(user_id = user.id.0, "sender has no username");
        deliver(&state, chat_id, trigger, &Reply::quoted(NO_USERNAME)).await;
        return Ok(());
    };

    if state.messenger.capabilities().supports_chat_actions {
        let _ = state
            .messenger
            .send_chat_action(chat_id, ChatAction::Typing)
            .await;
    }

    let caller = state.core.caller(username).await;
    debug!(command = %cmd, caller = %caller.address, admin = caller.is_admin, "command received");

    let replies = state
        .core
        .handle(&caller, &cmd, &args)
        .await
        .unwrap_or_else(|| vec![Reply::quoted(UNKNOWN_COMMAND)]);

    for reply in &replies {
        deliver(&state, chat_id, trigger, reply).await;
    }

    Ok(())
}
