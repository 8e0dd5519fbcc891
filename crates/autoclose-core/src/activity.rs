//! Activity listener: inbound user messages push the deadline back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    command::is_invocation,
    domain::{ChannelId, Entry, ScopeId, Stage},
    lifecycle::Lifecycle,
    messaging::types::{InboundMessage, MessageOrigin, CLOSING_NOTICE, SYSTEM_MARKER},
    ports::ThreadDirectory,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    OutsideInbox,
    NotInThread,
    SystemOrigin,
    SystemMarker,
    ClosingNotice,
    Command,
    NoOpenThread,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActivityOutcome {
    Ignored(IgnoreReason),
    /// Deadline pushed back.
    Reset(Entry),
    /// Entry is stopped; activity does not reactivate it.
    Stopped(Entry),
}

pub struct ActivityListener {
    lifecycle: Lifecycle,
    threads: Arc<dyn ThreadDirectory>,
    inbox: ScopeId,
    command_prefix: String,
}

impl ActivityListener {
    pub fn new(
        lifecycle: Lifecycle,
        threads: Arc<dyn ThreadDirectory>,
        inbox: ScopeId,
        command_prefix: impl Into<String>,
    ) -> Self {
        Self {
            lifecycle,
            threads,
            inbox,
            command_prefix: command_prefix.into(),
        }
    }

    /// Cheap, lookup-free filtering. Returns the channel to reset.
    pub fn classify<'m>(&self, msg: &'m InboundMessage) -> Result<&'m ChannelId, IgnoreReason> {
        if msg.scope_id != self.inbox {
            return Err(IgnoreReason::OutsideInbox);
        }
        let Some(channel_id) = msg.channel_id.as_ref() else {
            return Err(IgnoreReason::NotInThread);
        };
        if msg.origin == MessageOrigin::System {
            return Err(IgnoreReason::SystemOrigin);
        }

        let text = msg.text.trim_start();
        if text.starts_with(SYSTEM_MARKER) {
            return Err(IgnoreReason::SystemMarker);
        }
        if text.starts_with(CLOSING_NOTICE) {
            return Err(IgnoreReason::ClosingNotice);
        }
        if is_invocation(text, &self.command_prefix) {
            return Err(IgnoreReason::Command);
        }
        Ok(channel_id)
    }

    pub async fn on_message(&self, msg: &InboundMessage, now: DateTime<Utc>) -> ActivityOutcome {
        let channel_id = match self.classify(msg) {
            Ok(c) => c,
            Err(reason) => return ActivityOutcome::Ignored(reason),
        };

        let open = match self.threads.find_open_thread_by_channel_id(channel_id).await {
            Ok(thread) => thread.is_some(),
            Err(e) => {
                warn!("Thread lookup for channel {channel_id} failed: {e}");
                false
            }
        };
        if !open {
            if self.lifecycle.find(channel_id).await.is_some() {
                info!("Thread for channel {channel_id} is gone, dropping entry");
                self.lifecycle.remove(channel_id).await;
            }
            return ActivityOutcome::Ignored(IgnoreReason::NoOpenThread);
        }

        let close_at = now + self.lifecycle.config().close_window();
        let entry = self
            .lifecycle
            .upsert(channel_id, Stage::Active, Some(close_at), true, now)
            .await;

        if entry.stage == Stage::Stopped {
            ActivityOutcome::Stopped(entry)
        } else {
            debug!("Reset deadline of channel {channel_id} to {}", entry.close_at);
            ActivityOutcome::Reset(entry)
        }
    }
}
