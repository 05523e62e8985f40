//! Session manager settings.

use crate::session::SESSION_TTL_SECS;
use std::time::Duration;

/// Default window of the creation rate limit.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(30 * 60);
/// Default number of mailboxes that may be created per window.
pub const CREATION_QUOTA: usize = 3;

/// Tunables for a [`SessionManager`](crate::SessionManager).
///
/// # Defaults
/// - 600 second session lifetime
/// - at most 3 creations per 30 minutes
/// - one countdown tick per second
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) ttl_secs: u64,
    pub(crate) rate_window: Duration,
    pub(crate) creation_quota: usize,
    pub(crate) tick_period: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: SESSION_TTL_SECS,
            rate_window: RATE_LIMIT_WINDOW,
            creation_quota: CREATION_QUOTA,
            tick_period: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the session lifetime, in seconds.
    pub fn ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs.max(1);
        self
    }

    pub fn rate_window(mut self, window: Duration) -> Self {
        self.rate_window = window;
        self
    }

    pub fn creation_quota(mut self, quota: usize) -> Self {
        self.creation_quota = quota;
        self
    }

    /// Interval between countdown ticks. Each tick removes one second from the countdown,
    /// so anything other than one second only makes sense in tests and demos.
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period.max(Duration::from_millis(1));
        self
    }

    pub fn session_ttl(&self) -> u64 {
        self.ttl_secs
    }

    pub fn quota(&self) -> usize {
        self.creation_quota
    }
}
