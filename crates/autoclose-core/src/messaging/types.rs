use crate::domain::{ChannelId, ScopeId};

/// Prefix of every notification AutoClose posts.
pub const SYSTEM_MARKER: &str = "⚙️ AutoClose:";

/// Notice the host ticket system posts right before it closes a thread.
pub const CLOSING_NOTICE: &str = "Closing thread...";

/// Who wrote an inbound message, when the transport can tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOrigin {
    User,
    /// This bot or another automated participant.
    System,
}

/// Cross-messenger inbound message.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub scope_id: ScopeId,
    /// `None` when the message was not posted inside a thread.
    pub channel_id: Option<ChannelId>,
    pub text: String,
    pub origin: MessageOrigin,
}

/// Prepend the system marker unless `text` already carries it.
pub fn with_marker(text: &str) -> String {
    if text.starts_with(SYSTEM_MARKER) {
        text.to_string()
    } else {
        format!("{SYSTEM_MARKER} {text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_added_once() {
        let once = with_marker("Stopped AutoClose for this thread");
        assert_eq!(once, "⚙️ AutoClose: Stopped AutoClose for this thread");
        assert_eq!(with_marker(&once), once);
    }
}
