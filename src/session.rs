//! The persisted mailbox session.

use crate::store::{KeyValueStore, EMAIL_KEY, TIMER_KEY, TOKEN_KEY};
use crate::{Error, Result};
use std::fmt;

/// Lifetime of a mailbox session, in seconds.
pub const SESSION_TTL_SECS: u64 = 600;

/// The active temporary mailbox: address, bearer token and creation time.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    address: String,
    token: String,
    created_at: i64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Session {
    pub fn new(address: impl Into<String>, token: impl Into<String>, created_at: i64) -> Self {
        Self {
            address: address.into(),
            token: token.into(),
            created_at,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Session start, Unix milliseconds.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Seconds left at `now_millis` for a session lasting `ttl_secs`, in `[0, ttl_secs]`.
    pub fn remaining_at(&self, now_millis: i64, ttl_secs: u64) -> u64 {
        let elapsed_secs = now_millis.saturating_sub(self.created_at).div_euclid(1000);
        if elapsed_secs <= 0 {
            return ttl_secs;
        }
        ttl_secs.saturating_sub(elapsed_secs as u64)
    }

    /// Read the session fields from `store`.
    ///
    /// Returns `Ok(None)` when no field is stored, and [`Error::InvalidSession`] when
    /// only some of them are, or the timestamp does not parse.
    pub fn load(store: &dyn KeyValueStore) -> Result<Option<Self>> {
        let created_at = store.get(TIMER_KEY)?;
        let address = store.get(EMAIL_KEY)?;
        let token = store.get(TOKEN_KEY)?;

        match (created_at, address, token) {
            (None, None, None) => Ok(None),
            (Some(created_at), Some(address), Some(token))
                if !address.is_empty() && !token.is_empty() =>
            {
                let created_at = created_at.trim().parse::<i64>().map_err(|_| {
                    Error::InvalidSession(format!("unparseable start time {created_at:?}"))
                })?;
                Ok(Some(Self::new(address, token, created_at)))
            }
            _ => Err(Error::InvalidSession(
                "session fields are only partially stored".to_string(),
            )),
        }
    }

    /// Write all three session fields in one batch.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        let created_at = self.created_at.to_string();
        store.set_all(&[
            (TIMER_KEY, created_at.as_str()),
            (EMAIL_KEY, self.address.as_str()),
            (TOKEN_KEY, self.token.as_str()),
        ])
    }

    /// Remove all three session fields in one batch.
    pub fn clear(store: &dyn KeyValueStore) -> Result<()> {
        store.remove_all(&[TIMER_KEY, EMAIL_KEY, TOKEN_KEY])
    }
}

/// Where a mailbox session stands relative to its countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Live,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn remaining_is_clamped() {
        let session = Session::new("a@example.com", "tok", T0);

        assert_eq!(session.remaining_at(T0, 600), 600);
        assert_eq!(session.remaining_at(T0 + 999, 600), 600);
        assert_eq!(session.remaining_at(T0 + 1_000, 600), 599);
        assert_eq!(session.remaining_at(T0 + 125_500, 600), 475);
        assert_eq!(session.remaining_at(T0 + 600_000, 600), 0);
        assert_eq!(session.remaining_at(T0 + 605_000, 600), 0);
        // Clock moved backwards.
        assert_eq!(session.remaining_at(T0 - 30_000, 600), 600);
    }

    #[test]
    fn remaining_saturates_on_extreme_start_times() {
        let ancient = Session::new("a@example.com", "tok", i64::MIN);
        assert_eq!(ancient.remaining_at(T0, 600), 0);

        let far_future = Session::new("a@example.com", "tok", i64::MAX);
        assert_eq!(far_future.remaining_at(i64::MIN, 600), 600);
    }

    #[test]
    fn partial_fields_are_invalid() {
        let store = MemoryStore::new();
        store.set(EMAIL_KEY, "a@example.com").unwrap();
        store.set(TIMER_KEY, T0.to_string().as_str()).unwrap();

        let err = Session::load(&store).unwrap_err();
        assert!(matches!(err, Error::InvalidSession(_)));
    }

    #[test]
    fn garbage_timestamp_is_invalid() {
        let store = MemoryStore::new();
        store
            .set_all(&[(TIMER_KEY, "soon"), (EMAIL_KEY, "a@example.com"), (TOKEN_KEY, "tok")])
            .unwrap();

        assert!(matches!(
            Session::load(&store),
            Err(Error::InvalidSession(_))
        ));
    }

    #[test]
    fn save_load_clear() {
        let store = MemoryStore::new();
        assert_eq!(Session::load(&store).unwrap(), None);

        let session = Session::new("a@example.com", "tok", T0);
        session.save(&store).unwrap();
        assert_eq!(Session::load(&store).unwrap(), Some(session));

        Session::clear(&store).unwrap();
        assert_eq!(Session::load(&store).unwrap(), None);
    }

    #[test]
    fn debug_redacts_token() {
        let session = Session::new("a@example.com", "super-secret", T0);
        assert!(!format!("{session:?}").contains("super-secret"));
    }
}
