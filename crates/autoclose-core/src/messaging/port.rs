use async_trait::async_trait;
use tracing::warn;

use crate::{messaging::types::with_marker, ports::Thread, Result};

/// Cross-messenger notification port.
///
/// Fire-and-forget from the core's point of view: callers log failures and
/// carry on.
#[async_trait]
pub trait ThreadNotifier: Send + Sync {
    async fn post_system_message(&self, thread: &Thread, text: &str) -> Result<()>;
}

/// Post `text` (tagged with the system marker) into `thread`.
///
/// Returns whether the notifier accepted it; failures are logged only.
pub async fn post_notice(notifier: &dyn ThreadNotifier, thread: &Thread, text: &str) -> bool {
    let text = with_marker(text);
    match notifier.post_system_message(thread, &text).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Failed to post notice to thread {} (channel {}): {e}",
                thread.id, thread.channel_id
            );
            false
        }
    }
}
