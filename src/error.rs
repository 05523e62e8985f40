//! Error types for the temporary mailbox client.

use thiserror::Error;

/// Errors that can occur while talking to the mail service or managing a session.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// A response was missing fields or had an unexpected shape.
    #[error("Unexpected response: {msg}")]
    ResponseParseContext { msg: String },

    /// The domain list was empty.
    #[error("No domains available")]
    NoDomains,

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// The local creation quota for the current window is used up.
    #[error("Rate limited: {count} of {quota} mailboxes created in the current window")]
    RateLimited { count: usize, quota: usize },

    /// A live session already exists.
    #[error("A temporary mailbox is already active")]
    SessionActive,

    /// Persisted session fields were partial, unparseable or expired.
    #[error("Invalid persisted session: {0}")]
    InvalidSession(String),

    /// Reading or writing the local store failed.
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    /// The local store file is not a JSON object of strings.
    #[error("Storage file is malformed: {0}")]
    StoreFormat(String),
}

/// Coarse error category, used to pick a notification for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Protocol,
    RateLimited,
    InvalidSession,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Request(_) | Error::Status { .. } => ErrorKind::Network,
            Error::ResponseParseContext { .. } | Error::NoDomains | Error::Json(_) => {
                ErrorKind::Protocol
            }
            Error::RateLimited { .. } | Error::SessionActive => ErrorKind::RateLimited,
            Error::InvalidSession(_) => ErrorKind::InvalidSession,
            Error::Io(_) | Error::StoreFormat(_) => ErrorKind::Storage,
        }
    }

    /// One-line, plain-language description for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            Error::Status { status, .. } => {
                format!("The mail service rejected the request (HTTP {status}). Please try again.")
            }
            Error::NoDomains => "The mail service has no domains available right now.".to_string(),
            Error::RateLimited { quota, .. } => format!(
                "You can create at most {quota} addresses every 30 minutes. Please wait a bit."
            ),
            Error::SessionActive => {
                "A temporary address is already active. Discard it to get a new one.".to_string()
            }
            _ => match self.kind() {
                ErrorKind::Network => {
                    "Could not reach the mail service. Check your connection.".to_string()
                }
                ErrorKind::Protocol => {
                    "The mail service sent an unexpected response.".to_string()
                }
                ErrorKind::Storage => "Could not save local mailbox state.".to_string(),
                ErrorKind::InvalidSession => "The previous mailbox is no longer valid.".to_string(),
                ErrorKind::RateLimited => "Too many addresses created recently.".to_string(),
            },
        }
    }
}
