//! Session Manager
//!
//! Owns the single temporary mailbox: creates it, keeps it across restarts through
//! the local store, counts it down, and tears it down when the countdown ends.
//!
//! The manager is driven through `&mut self` by one task. The countdown is a
//! manager-owned interval polled through [`SessionManager::next_tick`]; callers
//! interleave it with inbox refreshes (for example with `tokio::select!`), and the
//! borrow checker guarantees the two never run at the same time.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, Interval};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::events::SessionEvent;
use crate::rate_limit::RateLimiter;
use crate::session::{Session, SessionState};
use crate::store::KeyValueStore;
use crate::{Client, Error, MessageDetails, MessageSummary, Result};

const EVENT_CAPACITY: usize = 64;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub struct SessionManager {
    client: Client,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    limiter: RateLimiter,
    /// `Some` exactly while the session is live
    session: Option<Session>,
    remaining: u64,
    /// Created lazily on the first `next_tick`, dropped on expiry
    countdown: Option<Interval>,
    inbox: Vec<MessageSummary>,
    bodies: HashMap<String, MessageDetails>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(client: Client, store: Arc<dyn KeyValueStore>, config: SessionConfig) -> Self {
        let limiter = RateLimiter::new(config.rate_window, config.creation_quota);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            client,
            store,
            clock: Arc::new(SystemClock),
            config,
            limiter,
            session: None,
            remaining: 0,
            countdown: None,
            inbox: Vec::new(),
            bodies: HashMap::new(),
            events,
        }
    }

    /// Replace the wall clock, mainly for tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Receive every [`SessionEvent`] emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> SessionState {
        if self.is_live() {
            SessionState::Live
        } else {
            SessionState::Absent
        }
    }

    pub fn is_live(&self) -> bool {
        self.session.is_some() && self.remaining > 0
    }

    /// Seconds left on the countdown, `0` when no session is live.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Messages from the last successful refresh.
    pub fn inbox(&self) -> &[MessageSummary] {
        &self.inbox
    }

    pub fn unread_count(&self) -> usize {
        self.inbox.iter().filter(|m| m.is_unread()).count()
    }

    /// Reinstate a persisted session, if a complete and unexpired one exists.
    ///
    /// The countdown resumes from the time actually left, not from the full lifetime.
    /// Partial, unparseable or expired state is cleared and reported as `None`, as is
    /// a start time more than one lifetime ahead of the clock.
    /// Never touches the network.
    pub fn restore(&mut self) -> Option<Session> {
        let loaded = match Session::load(self.store.as_ref()) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::debug!(error = %e, "discarding persisted session");
                self.reset_persisted();
                return None;
            }
        };

        let Some(session) = loaded else {
            tracing::debug!("no persisted session");
            return None;
        };

        let now = self.clock.now_millis();
        let ttl_millis = i64::try_from(self.config.ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        if session.created_at() > now.saturating_add(ttl_millis) {
            tracing::debug!(
                created_at = session.created_at(),
                "discarding persisted session that starts in the future"
            );
            self.reset_persisted();
            return None;
        }

        let remaining = session.remaining_at(now, self.config.ttl_secs);
        if remaining == 0 {
            tracing::info!(address = %session.address(), "persisted session has expired");
            self.reset_persisted();
            let _ = self.events.send(SessionEvent::Expired);
            return None;
        }

        tracing::info!(
            address = %session.address(),
            remaining_secs = remaining,
            "restored session"
        );
        self.start(session.clone(), remaining);
        let _ = self.events.send(SessionEvent::Restored(session.clone()));
        Some(session)
    }

    /// Number of mailboxes created inside the current rate-limit window.
    pub fn check_rate_limit(&self) -> Result<usize> {
        self.limiter
            .check(self.store.as_ref(), self.clock.now_millis())
    }

    /// Create a new mailbox and start its countdown.
    ///
    /// # Errors
    /// - [`Error::SessionActive`] while a session is live; use
    ///   [`SessionManager::discard_and_recreate`] instead.
    /// - [`Error::RateLimited`] when the creation quota is used up.
    /// - [`Error::NoDomains`] or any network error from the remote steps.
    ///
    /// Every failure emits a single [`SessionEvent::CreationFailed`] and leaves no
    /// session behind, so the call can simply be retried.
    pub async fn create(&mut self) -> Result<Session> {
        match self.try_create().await {
            Ok(session) => {
                tracing::info!(address = %session.address(), "created temporary mailbox");
                let _ = self.events.send(SessionEvent::Created(session.clone()));
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "mailbox creation failed");
                let _ = self
                    .events
                    .send(SessionEvent::CreationFailed(e.user_message()));
                Err(e)
            }
        }
    }

    async fn try_create(&mut self) -> Result<Session> {
        if self.is_live() {
            return Err(Error::SessionActive);
        }

        let gate = self
            .limiter
            .try_acquire(self.store.as_ref(), self.clock.now_millis())?;
        if let Err(count) = gate {
            return Err(Error::RateLimited {
                count,
                quota: self.limiter.quota(),
            });
        }

        let local_part = random_local_part();

        let domain = self
            .client
            .domains()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoDomains)?;

        let address = format!("{local_part}@{}", domain.domain);
        let password = random_password();
        tracing::debug!(%address, "registering account");

        self.client.create_account(&address, &password).await?;
        let token = self.client.token(&address, &password).await?;

        let session = Session::new(address, token, self.clock.now_millis());
        session.save(self.store.as_ref())?;
        self.start(session.clone(), self.config.ttl_secs);
        Ok(session)
    }

    /// Count one second down. Expires the session when the countdown reaches zero.
    ///
    /// Returns the seconds left, or `None` when no session is live.
    pub fn tick(&mut self) -> Option<u64> {
        if !self.is_live() {
            return None;
        }

        self.remaining -= 1;
        let _ = self.events.send(SessionEvent::Tick(self.remaining));
        if self.remaining == 0 {
            self.expire();
        }
        Some(self.remaining)
    }

    /// Wait for the next countdown period, then [`tick`](SessionManager::tick).
    ///
    /// Returns `None` immediately when no session is live. Dropping the returned
    /// future between periods is safe; the countdown picks up where it was.
    pub async fn next_tick(&mut self) -> Option<u64> {
        if !self.is_live() {
            self.countdown = None;
            return None;
        }

        let period = self.config.tick_period;
        let countdown = self
            .countdown
            .get_or_insert_with(|| interval_at(Instant::now() + period, period));
        countdown.tick().await;
        self.tick()
    }

    /// End the current session. Safe to call in any state.
    ///
    /// Clears the persisted fields, the in-memory session and cached inbox, and
    /// releases the countdown. [`SessionEvent::Expired`] is emitted only when a
    /// live session actually ended.
    pub fn expire(&mut self) {
        let ended = self.session.is_some();
        self.reset_persisted();

        if ended {
            tracing::info!("temporary mailbox expired");
            let _ = self.events.send(SessionEvent::Expired);
        }
    }

    /// Throw away the current mailbox and create a fresh one.
    ///
    /// When the creation quota is already used up the current mailbox is kept and
    /// [`Error::RateLimited`] is returned.
    pub async fn discard_and_recreate(&mut self) -> Result<Session> {
        let count = self.check_rate_limit()?;
        if count >= self.limiter.quota() {
            let e = Error::RateLimited {
                count,
                quota: self.limiter.quota(),
            };
            tracing::warn!(error = %e, "keeping current mailbox");
            let _ = self
                .events
                .send(SessionEvent::CreationFailed(e.user_message()));
            return Err(e);
        }

        self.expire();
        self.create().await
    }

    /// Reload the inbox from the service.
    ///
    /// Does nothing while no session is live. A failure is reported through
    /// [`SessionEvent::InboxRefreshFailed`] and returned, but the session and its
    /// countdown carry on.
    pub async fn refresh_inbox(&mut self) -> Result<&[MessageSummary]> {
        let Some(token) = self.live_token() else {
            return Ok(&[]);
        };

        match self.client.get_messages(&token).await {
            Ok(messages) => {
                self.inbox = messages;
                let _ = self.events.send(SessionEvent::InboxUpdated {
                    total: self.inbox.len(),
                    unread: self.unread_count(),
                });
                Ok(&self.inbox)
            }
            Err(e) => Err(self.inbox_failure(e, "inbox refresh failed")),
        }
    }

    /// Full content of one message, fetched once and then served from cache.
    ///
    /// Marks the message as read in the cached inbox. Returns `None` while no
    /// session is live.
    pub async fn open_message(&mut self, id: &str) -> Result<Option<MessageDetails>> {
        let Some(token) = self.live_token() else {
            return Ok(None);
        };

        let details = match self.bodies.get(id).cloned() {
            Some(details) => details,
            None => match self.client.fetch_message(&token, id).await {
                Ok(details) => {
                    self.bodies.insert(id.to_string(), details.clone());
                    details
                }
                Err(e) => return Err(self.inbox_failure(e, "failed to load message")),
            },
        };

        if let Some(summary) = self.inbox.iter_mut().find(|m| m.id == id) {
            summary.seen = true;
        }
        Ok(Some(details))
    }

    /// Delete the given messages, then refresh the inbox.
    ///
    /// Stops at the first failed deletion. Returns how many were deleted; `0` while
    /// no session is live or when `ids` is empty. A failed refresh afterwards is only
    /// reported through [`SessionEvent::InboxRefreshFailed`].
    pub async fn delete_messages(&mut self, ids: &[&str]) -> Result<usize> {
        let Some(token) = self.live_token() else {
            return Ok(0);
        };
        if ids.is_empty() {
            return Ok(0);
        }

        for id in ids {
            if let Err(e) = self.client.delete_message(&token, id).await {
                return Err(self.inbox_failure(e, "failed to delete message"));
            }
            self.bodies.remove(*id);
        }

        tracing::info!(count = ids.len(), "deleted messages");
        let _ = self.refresh_inbox().await;
        Ok(ids.len())
    }

    fn live_token(&self) -> Option<String> {
        if !self.is_live() {
            return None;
        }
        self.session.as_ref().map(|s| s.token().to_string())
    }

    fn inbox_failure(&self, error: Error, what: &str) -> Error {
        tracing::warn!(error = %error, "{what}");
        let _ = self
            .events
            .send(SessionEvent::InboxRefreshFailed(error.user_message()));
        error
    }

    fn start(&mut self, session: Session, remaining: u64) {
        self.session = Some(session);
        self.remaining = remaining.min(self.config.ttl_secs);
        self.countdown = None;
        self.inbox.clear();
        self.bodies.clear();
    }

    fn reset_persisted(&mut self) {
        self.session = None;
        self.remaining = 0;
        self.countdown = None;
        self.inbox.clear();
        self.bodies.clear();

        if let Err(e) = Session::clear(self.store.as_ref()) {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }
    }
}

/// Six random bytes, each written as two base-36 digits.
fn random_local_part() -> String {
    let bytes: [u8; 6] = rand::thread_rng().gen();
    bytes.iter().map(|b| byte_to_base36(*b)).collect()
}

fn byte_to_base36(b: u8) -> String {
    let hi = BASE36[usize::from(b / 36)] as char;
    let lo = BASE36[usize::from(b % 36)] as char;
    format!("{hi}{lo}")
}

/// Eight base-36 characters plus a fixed suffix with an upper-case letter and a symbol.
fn random_password() -> String {
    let mut rng = rand::thread_rng();
    let mut password: String = (0..8)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    password.push_str("*Temp");
    password
}
