use async_trait::async_trait;

use crate::{
    domain::{ChannelId, ThreadId},
    Result,
};

/// An open ticket thread as seen by the host ticket system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thread {
    pub id: ThreadId,
    pub channel_id: ChannelId,
}

/// Hexagonal port for resolving channels to open threads.
#[async_trait]
pub trait ThreadDirectory: Send + Sync {
    /// Returns `None` if the thread is closed or unknown.
    async fn find_open_thread_by_channel_id(&self, channel_id: &ChannelId)
        -> Result<Option<Thread>>;
}

/// Scheduled-close record handed to the host ticket system.
///
/// The host's own close job picks this up and performs the actual close.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledClose {
    pub thread_id: ThreadId,
    /// Local time, `YYYY-MM-DD hh:mm:ss`.
    pub close_at: String,
    pub actor_id: String,
    pub actor_name: String,
}

#[async_trait]
pub trait CloseScheduler: Send + Sync {
    async fn schedule_close(&self, close: ScheduledClose) -> Result<()>;
}
