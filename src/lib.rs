//! Temporary mailbox client
//!
//! An async client for the mail.tm disposable email service, plus a
//! [`SessionManager`] that owns one short-lived mailbox: it creates the account,
//! persists the session to a local store so it survives restarts, counts down the
//! ten-minute lifetime, and cleans everything up on expiry.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use tempmail_session::{Client, FileStore, SessionConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tempmail_session::Error> {
//!     let store = Arc::new(FileStore::open("tempmail.json")?);
//!     let mut manager = SessionManager::new(Client::new()?, store, SessionConfig::default());
//!
//!     let session = match manager.restore() {
//!         Some(session) => session,
//!         None => manager.create().await?,
//!     };
//!     println!("Address: {}", session.address());
//!
//!     while let Some(remaining) = manager.next_tick().await {
//!         if remaining % 10 == 0 {
//!             for msg in manager.refresh_inbox().await? {
//!                 println!("From: {}, Subject: {}", msg.sender(), msg.subject_or_default());
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod clock;
mod config;
mod error;
mod events;
mod manager;
mod models;
mod rate_limit;
mod session;
mod store;

pub use client::{Client, ClientBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SessionConfig, CREATION_QUOTA, RATE_LIMIT_WINDOW};
pub use error::{Error, ErrorKind};
pub use events::{format_remaining, SessionEvent};
pub use manager::SessionManager;
pub use models::{Account, Address, Domain, MessageDetails, MessageSummary};
pub use rate_limit::RateLimiter;
pub use session::{Session, SessionState, SESSION_TTL_SECS};
pub use store::{FileStore, KeyValueStore, MemoryStore, Theme};

/// Result type alias for mailbox operations.
///
/// This is equivalent to `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
