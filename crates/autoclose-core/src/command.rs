//! The `ac` operator command: status, start and stop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    domain::{ChannelId, Stage},
    formatting::format_remaining,
    lifecycle::Lifecycle,
    messaging::{
        port::{post_notice, ThreadNotifier},
        types::with_marker,
    },
    ports::ThreadDirectory,
    Result,
};

pub const COMMAND_NAME: &str = "ac";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandAction {
    Status,
    Start,
    Stop,
    Unknown,
}

impl CommandAction {
    pub fn parse(arg: Option<&str>) -> Self {
        let arg = arg.map(str::trim).unwrap_or("").to_lowercase();
        match arg.as_str() {
            "" | "status" => CommandAction::Status,
            "start" => CommandAction::Start,
            "stop" => CommandAction::Stop,
            _ => CommandAction::Unknown,
        }
    }
}

/// Argument text of a `{prefix}ac ...` invocation, `None` if `text` is not one.
///
/// Accepts a trailing bot mention (`/ac@my_bot start`). A bare invocation
/// yields `Some("")`.
pub fn invocation_args<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    let rest = text
        .trim_start()
        .strip_prefix(prefix)?
        .strip_prefix(COMMAND_NAME)?;

    let rest = match rest.strip_prefix('@') {
        Some(mention) => mention.trim_start_matches(|c: char| !c.is_whitespace()),
        None if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
        None => return None,
    };
    Some(rest.trim())
}

pub fn is_invocation(text: &str, prefix: &str) -> bool {
    invocation_args(text, prefix).is_some()
}

pub struct AutoCloseCommand {
    lifecycle: Lifecycle,
    threads: Arc<dyn ThreadDirectory>,
    notifier: Arc<dyn ThreadNotifier>,
    command_prefix: String,
}

impl AutoCloseCommand {
    pub fn new(
        lifecycle: Lifecycle,
        threads: Arc<dyn ThreadDirectory>,
        notifier: Arc<dyn ThreadNotifier>,
        command_prefix: impl Into<String>,
    ) -> Self {
        Self {
            lifecycle,
            threads,
            notifier,
            command_prefix: command_prefix.into(),
        }
    }

    /// Run the command in `channel_id` and post the reply into its thread.
    ///
    /// Returns the posted text, or `None` when the channel has no open thread.
    pub async fn handle(
        &self,
        channel_id: &ChannelId,
        arg: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let Some(thread) = self
            .threads
            .find_open_thread_by_channel_id(channel_id)
            .await?
        else {
            return Ok(None);
        };

        let reply = match CommandAction::parse(arg) {
            CommandAction::Status => match self.lifecycle.find(channel_id).await {
                None => "AutoClose is not tracking this thread".to_string(),
                Some(entry) if entry.stage == Stage::Stopped => {
                    "This thread is currently stopped".to_string()
                }
                Some(entry) => format!(
                    "This thread will close in {}",
                    format_remaining(entry.close_at - now)
                ),
            },
            CommandAction::Start => {
                let entry = self.lifecycle.restart(channel_id, now).await;
                info!("Restarted channel {channel_id}, closes at {}", entry.close_at);
                "Restarted AutoClose for this thread".to_string()
            }
            CommandAction::Stop => {
                self.lifecycle
                    .upsert(channel_id, Stage::Stopped, None, false, now)
                    .await;
                info!("Stopped channel {channel_id}");
                "Stopped AutoClose for this thread".to_string()
            }
            CommandAction::Unknown => {
                format!("Usage: {}{COMMAND_NAME} [start|stop]", self.command_prefix)
            }
        };

        post_notice(self.notifier.as_ref(), &thread, &reply).await;
        Ok(Some(with_marker(&reply)))
    }
}
