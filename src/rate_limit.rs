//! Local limit on how many mailboxes may be created per time window.
//!
//! The ledger lives only in the local store, so it is a nudge against casual
//! abuse rather than an access control.

use crate::store::{KeyValueStore, LIMIT_KEY};
use crate::Result;
use std::time::Duration;

/// Ledger of recent creation timestamps (Unix milliseconds), oldest first.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    quota: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, quota: usize) -> Self {
        Self { window, quota }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Prune entries older than the window, persist the result, and return it.
    pub fn prune(&self, store: &dyn KeyValueStore, now_millis: i64) -> Result<Vec<i64>> {
        let window = i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX);
        let ledger = Self::load(store)?;
        let recent: Vec<i64> = ledger
            .into_iter()
            .filter(|t| now_millis.saturating_sub(*t) < window)
            .collect();

        store.set(LIMIT_KEY, &serde_json::to_string(&recent)?)?;
        Ok(recent)
    }

    /// Number of creations inside the current window.
    pub fn check(&self, store: &dyn KeyValueStore, now_millis: i64) -> Result<usize> {
        Ok(self.prune(store, now_millis)?.len())
    }

    /// If the quota allows it, record a creation at `now_millis`.
    ///
    /// Returns `Err(count)` with the current count when the quota is used up.
    pub fn try_acquire(
        &self,
        store: &dyn KeyValueStore,
        now_millis: i64,
    ) -> Result<std::result::Result<usize, usize>> {
        let mut recent = self.prune(store, now_millis)?;
        if recent.len() >= self.quota {
            return Ok(Err(recent.len()));
        }

        recent.push(now_millis);
        store.set(LIMIT_KEY, &serde_json::to_string(&recent)?)?;
        Ok(Ok(recent.len()))
    }

    fn load(store: &dyn KeyValueStore) -> Result<Vec<i64>> {
        let Some(raw) = store.get(LIMIT_KEY)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<i64>>(&raw) {
            Ok(ledger) => Ok(ledger),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable rate-limit ledger");
                Ok(Vec::new())
            }
        }
    }
}
