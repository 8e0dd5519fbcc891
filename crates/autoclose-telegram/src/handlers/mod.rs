//! Telegram update handlers.
//!
//! Every message in the inbox either runs the `ac` command or counts as
//! thread activity.

use std::sync::Arc;

use chrono::Utc;
use teloxide::{prelude::*, types::Message};
use tracing::{debug, error};

use autoclose_core::{
    activity::ActivityOutcome,
    command::invocation_args,
    domain::{ChannelId, ScopeId},
    messaging::types::{InboundMessage, MessageOrigin},
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let inbound = inbound_message(&msg, state.bot_user_id);
    let now = Utc::now();

    match route(&inbound, state.cfg.inbox_chat_id, &state.cfg.command_prefix) {
        Route::Command { channel_id, arg } => {
            if let Err(e) = state.command.handle(channel_id, arg, now).await {
                error!("ac command in channel {channel_id} failed: {e}");
            }
        }
        Route::Activity => match state.listener.on_message(&inbound, now).await {
            ActivityOutcome::Ignored(reason) => debug!(?reason, "Message ignored"),
            ActivityOutcome::Reset(entry) | ActivityOutcome::Stopped(entry) => {
                debug!(channel = %entry.channel_id, stage = ?entry.stage, "Activity recorded")
            }
        },
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Route<'m> {
    Command {
        channel_id: &'m ChannelId,
        arg: Option<&'m str>,
    },
    Activity,
}

/// Commands run only for user messages inside an inbox thread. Everything
/// else goes to the activity listener, which does its own filtering.
fn route<'m>(inbound: &'m InboundMessage, inbox_chat_id: i64, prefix: &str) -> Route<'m> {
    if inbound.scope_id.0 != inbox_chat_id || inbound.origin != MessageOrigin::User {
        return Route::Activity;
    }
    match (
        inbound.channel_id.as_ref(),
        invocation_args(&inbound.text, prefix),
    ) {
        (Some(channel_id), Some(args)) => Route::Command {
            channel_id,
            arg: (!args.is_empty()).then_some(args),
        },
        _ => Route::Activity,
    }
}

/// Map a Telegram message onto the transport-neutral inbound model.
///
/// Media without a caption still counts as activity, with empty text.
fn inbound_message(msg: &Message, bot_user_id: u64) -> InboundMessage {
    let text = msg.text().or_else(|| msg.caption()).unwrap_or("");
    let origin = match msg.from() {
        Some(user) if user.id.0 == bot_user_id => MessageOrigin::System,
        _ => MessageOrigin::User,
    };

    InboundMessage {
        scope_id: ScopeId(msg.chat.id.0),
        channel_id: msg.thread_id.map(|id| ChannelId::new(id.to_string())),
        text: text.to_string(),
        origin,
    }
}
