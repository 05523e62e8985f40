//! Payload models for the mail.tm API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection envelope used by every list endpoint (`hydra:member`).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HydraCollection<T> {
    #[serde(rename = "hydra:member", default = "Vec::new")]
    pub member: Vec<T>,
}

/// A mail domain offered by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Domain id.
    pub id: String,
    /// Domain name, e.g. `example.com`.
    pub domain: String,
    /// Whether new accounts may be registered under this domain.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Account record returned by `POST /accounts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account id.
    pub id: String,
    /// Registered address.
    pub address: String,
    /// Account creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Credential body sent to `/accounts` and `/token`.
#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub address: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
}

/// Sender or recipient of a message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    /// Email address.
    #[serde(default)]
    pub address: String,
    /// Display name, often empty.
    #[serde(default)]
    pub name: String,
}

/// An inbox entry as returned by `GET /messages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    /// Unique message id.
    pub id: String,
    /// Sender.
    #[serde(default)]
    pub from: Option<Address>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Short excerpt of the body.
    #[serde(default)]
    pub intro: String,
    /// When the message was received.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Whether the message has been read.
    #[serde(default)]
    pub seen: bool,
}

impl MessageSummary {
    /// Sender address, or `"Unknown Sender"`.
    pub fn sender(&self) -> &str {
        self.from
            .as_ref()
            .map(|a| a.address.as_str())
            .filter(|a| !a.is_empty())
            .unwrap_or("Unknown Sender")
    }

    /// Subject line, or `"(No Subject)"`.
    pub fn subject_or_default(&self) -> &str {
        if self.subject.is_empty() {
            "(No Subject)"
        } else {
            &self.subject
        }
    }

    /// Body excerpt, or `"No preview available"`.
    pub fn preview(&self) -> &str {
        if self.intro.is_empty() {
            "No preview available"
        } else {
            &self.intro
        }
    }

    pub fn is_unread(&self) -> bool {
        !self.seen
    }
}

/// Full message returned by `GET /messages/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetails {
    /// Unique message id.
    pub id: String,
    /// Sender.
    #[serde(default)]
    pub from: Option<Address>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Plain-text body, when present.
    #[serde(default)]
    pub text: Option<String>,
    /// HTML body parts.
    #[serde(default)]
    pub html: Vec<String>,
    /// When the message was received.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MessageDetails {
    /// Best available body: text, then HTML, then a placeholder.
    pub fn body(&self) -> String {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            return text.to_string();
        }
        if !self.html.is_empty() {
            return self.html.concat();
        }
        "(No content available)".to_string()
    }

    /// Whether [`MessageDetails::body`] looks like markup.
    pub fn is_html(&self) -> bool {
        let body = self.body();
        body.contains('<') && body.contains('>')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_falls_back_to_placeholders() {
        let msg: MessageSummary = serde_json::from_value(json!({
            "id": "m1",
            "subject": "",
            "intro": "",
            "createdAt": "2024-05-01T10:00:00+00:00",
        }))
        .unwrap();

        assert_eq!(msg.sender(), "Unknown Sender");
        assert_eq!(msg.subject_or_default(), "(No Subject)");
        assert_eq!(msg.preview(), "No preview available");
        assert!(msg.is_unread());
    }

    #[test]
    fn summary_without_timestamp_still_parses() {
        let msg: MessageSummary = serde_json::from_value(json!({
            "id": "m2",
            "from": { "address": "s@example.net" },
            "subject": "No date",
        }))
        .unwrap();

        assert!(msg.created_at.is_none());
        assert_eq!(msg.sender(), "s@example.net");
    }

    #[test]
    fn details_body_prefers_text_then_html() {
        let mut details: MessageDetails = serde_json::from_value(json!({
            "id": "m1",
            "text": "plain",
            "html": ["<p>rich</p>"],
            "createdAt": "2024-05-01T10:00:00+00:00",
        }))
        .unwrap();
        assert_eq!(details.body(), "plain");
        assert!(!details.is_html());

        details.text = None;
        assert_eq!(details.body(), "<p>rich</p>");
        assert!(details.is_html());

        details.html.clear();
        assert_eq!(details.body(), "(No content available)");
    }
}
