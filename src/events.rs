//! Signals emitted by the session manager for whatever renders the mailbox.

use crate::Session;

/// A state change the rendering layer may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A persisted session was reinstated on startup.
    Restored(Session),
    /// A new mailbox was created.
    Created(Session),
    /// The live session ended; cached inbox contents are gone.
    Expired,
    /// Seconds left on the countdown.
    Tick(u64),
    /// Mailbox creation failed; the payload is a user-facing message.
    CreationFailed(String),
    /// The inbox was refreshed.
    InboxUpdated { total: usize, unread: usize },
    /// An inbox read or delete failed; the session is still live.
    InboxRefreshFailed(String),
}

/// Format seconds as `MM:SS` for a countdown display.
pub fn format_remaining(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_countdown() {
        assert_eq!(format_remaining(600), "10:00");
        assert_eq!(format_remaining(61), "01:01");
        assert_eq!(format_remaining(0), "00:00");
    }
}
