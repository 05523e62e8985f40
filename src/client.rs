//! mail.tm async client implementation.
//!
//! This module provides an async [`Client`] and [`ClientBuilder`] for the mail.tm
//! temporary mailbox REST API.
//!
//! Typical flow:
//! 1) Build a client (`Client::new` or `Client::builder().build()`)
//! 2) Pick a domain via [`Client::domains`]
//! 3) Register via [`Client::create_account`] and log in via [`Client::token`]
//! 4) Poll the inbox via [`Client::get_messages`]
//! 5) Fetch or delete single messages via [`Client::fetch_message`] / [`Client::delete_message`]
//!
//! Most callers should not drive these steps by hand; [`SessionManager`](crate::SessionManager)
//! sequences them and keeps the resulting session alive across restarts.

use crate::models::{Credentials, HydraCollection, TokenResponse};
use crate::{Account, Domain, Error, MessageDetails, MessageSummary, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use std::fmt;
use std::time::Duration;

/// Async client for the mail.tm API.
///
/// The type is `Clone`; clones share the underlying `reqwest` connection pool.
///
/// The client itself is stateless: account credentials and bearer tokens are passed
/// per call, so one client can serve any number of mailboxes.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    proxy: Option<String>,
    user_agent: String,
    base_url: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("http", &"<reqwest::Client>")
            .field("proxy", &self.proxy)
            .field("user_agent", &self.user_agent)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Client {
    /// Create a [`ClientBuilder`] for configuring a new client.
    ///
    /// # Examples
    /// ```no_run
    /// # use tempmail_session::Client;
    /// # fn main() -> Result<(), tempmail_session::Error> {
    /// let client = Client::builder()
    ///     .user_agent("my-app/1.0")
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client with default settings against `https://api.mail.tm`.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Get the proxy URL configured for this client (if any).
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Base URL all endpoints are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the domains new accounts can be registered under.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response has no `hydra:member` array.
    /// An empty list is not an error here; callers decide what to do with it.
    pub async fn domains(&self) -> Result<Vec<Domain>> {
        let response: serde_json::Value = self
            .request(Method::GET, "/domains", None, None::<&()>)
            .await?;

        if response.get("hydra:member").and_then(|v| v.as_array()).is_none() {
            return Err(Error::ResponseParseContext {
                msg: format!(
                    "missing or non-array `hydra:member` (response: {})",
                    Self::json_snippet(&response)
                ),
            });
        }

        let collection = serde_json::from_value::<HydraCollection<Domain>>(response)?;
        Ok(collection.member)
    }

    /// Register a new account.
    ///
    /// # Errors
    /// Fails with [`Error::Status`] when the service rejects the address (for example
    /// `422` when it is already taken) or the password.
    pub async fn create_account(&self, address: &str, password: &str) -> Result<Account> {
        let body = Credentials { address, password };
        self.request(Method::POST, "/accounts", None, Some(&body))
            .await
    }

    /// Exchange account credentials for a bearer token.
    pub async fn token(&self, address: &str, password: &str) -> Result<String> {
        let body = Credentials { address, password };
        let response: TokenResponse = self
            .request(Method::POST, "/token", None, Some(&body))
            .await?;

        if response.token.trim().is_empty() {
            return Err(Error::ResponseParseContext {
                msg: "empty `token` in token response".to_string(),
            });
        }
        Ok(response.token)
    }

    /// Retrieve the inbox for the account owning `token`.
    ///
    /// # Examples
    /// ```no_run
    /// # use tempmail_session::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), tempmail_session::Error> {
    /// let client = Client::new()?;
    /// let token = client.token("someone@example.com", "secret*Temp").await?;
    /// for msg in client.get_messages(&token).await? {
    ///     println!("{}: {}", msg.sender(), msg.subject_or_default());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_messages(&self, token: &str) -> Result<Vec<MessageSummary>> {
        let response: serde_json::Value = self
            .request(Method::GET, "/messages", Some(token), None::<&()>)
            .await?;

        let list = response
            .get("hydra:member")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::ResponseParseContext {
                msg: format!(
                    "missing or non-array `hydra:member` (response: {})",
                    Self::json_snippet(&response)
                ),
            })?;

        let messages = list
            .iter()
            .map(|v| serde_json::from_value::<MessageSummary>(v.clone()).map_err(Into::into))
            .collect::<Result<Vec<_>>>()?;

        Ok(messages)
    }

    /// Fetch the full content of one message.
    pub async fn fetch_message(&self, token: &str, id: &str) -> Result<MessageDetails> {
        Self::check_id(id)?;
        let path = format!("/messages/{id}");
        self.request(Method::GET, &path, Some(token), None::<&()>)
            .await
    }

    /// Delete one message.
    ///
    /// # Returns
    /// `Ok(())` on any 2xx; the service answers `204 No Content`.
    pub async fn delete_message(&self, token: &str, id: &str) -> Result<()> {
        Self::check_id(id)?;
        let path = format!("/messages/{id}");
        self.execute_request(Method::DELETE, &path, Some(token), None::<&()>)
            .await?;
        Ok(())
    }

    fn check_id(id: &str) -> Result<()> {
        if id.trim().is_empty() || id.contains('/') {
            return Err(Error::ResponseParseContext {
                msg: format!("invalid message id {id:?}"),
            });
        }
        Ok(())
    }

    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let (_status, bytes) = self.execute_request(method, path, token, body).await?;
        let parsed = serde_json::from_slice::<T>(&bytes)?;
        Ok(parsed)
    }

    async fn execute_request<B>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<(StatusCode, Vec<u8>)>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path);

        #[cfg(feature = "debug_responses")]
        self.log_request(&method, &url, token.is_some());

        let mut req = self
            .http
            .request(method, &url)
            .headers(self.headers(token)?);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            // Keep a small body snippet for diagnostics without wasting too much bandwidth.
            let body_snippet = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_string())
                .chars()
                .take(512)
                .collect::<String>();

            tracing::debug!(status = status.as_u16(), %url, "mail service returned error status");

            return Err(Error::Status {
                status: status.as_u16(),
                url,
                body: body_snippet,
            });
        }

        let bytes = response.bytes().await?;

        #[cfg(feature = "debug_responses")]
        self.log_response(status, &bytes);

        Ok((status, bytes.to_vec()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Construct the headers for an API request, with a bearer token when given.
    fn headers(&self, token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                Error::ResponseParseContext {
                    msg: "token contains characters not allowed in a header".to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    fn json_snippet(value: &serde_json::Value) -> String {
        let raw = value.to_string();
        raw.chars().take(200).collect()
    }

    #[cfg(feature = "debug_responses")]
    fn log_request(&self, method: &Method, url: &str, authorized: bool) {
        tracing::debug!(%method, %url, authorized, "mail.tm request");
    }

    #[cfg(feature = "debug_responses")]
    fn log_response(&self, status: StatusCode, body: &[u8]) {
        if let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(body) {
            Self::redact_tokens_in_value(&mut value);
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                tracing::debug!(status = status.as_u16(), body = %pretty, "mail.tm response");
                return;
            }
        }

        let body_text = String::from_utf8_lossy(body);
        tracing::debug!(
            status = status.as_u16(),
            body = %Self::redact_tokens_in_text(&body_text),
            "mail.tm response"
        );
    }

    #[cfg(feature = "debug_responses")]
    fn redact_tokens_in_value(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key = key.to_lowercase();
                    if key.contains("token") || key.contains("password") {
                        *val = serde_json::Value::String("<redacted>".to_string());
                    } else {
                        Self::redact_tokens_in_value(val);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    Self::redact_tokens_in_value(item);
                }
            }
            _ => {}
        }
    }

    #[cfg(feature = "debug_responses")]
    fn redact_tokens_in_text(raw: &str) -> String {
        let mut redacted = raw.to_string();

        let patterns = [
            r#"(?i)("token"\s*:\s*")[^"]*(")"#,
            r#"(?i)("password"\s*:\s*")[^"]*(")"#,
            r#"(?i)(Bearer\s+)[A-Za-z0-9._\-]+"#,
        ];

        for pattern in patterns {
            if let Ok(re) = regex::Regex::new(pattern) {
                redacted = re
                    .replace_all(&redacted, |caps: &regex::Captures<'_>| {
                        if caps.len() >= 3 {
                            format!("{}<redacted>{}", &caps[1], &caps[2])
                        } else {
                            format!("{}<redacted>", &caps[1])
                        }
                    })
                    .to_string();
            }
        }

        redacted
    }
}

const BASE_URL: &str = "https://api.mail.tm";
const USER_AGENT_VALUE: &str = concat!("tempmail-session/", env!("CARGO_PKG_VERSION"));

/// Builder for configuring a mail.tm [`Client`].
///
/// # Defaults
/// - No proxy
/// - Strict TLS verification
/// - `tempmail-session/<version>` user agent
/// - `https://api.mail.tm` base URL
/// - Reqwest default timeout
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    proxy: Option<String>,
    danger_accept_invalid_certs: bool,
    user_agent: String,
    base_url: String,
    timeout: Option<Duration>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            proxy: None,
            danger_accept_invalid_certs: false,
            user_agent: USER_AGENT_VALUE.to_string(),
            base_url: BASE_URL.to_string(),
            timeout: None,
        }
    }

    /// Set a proxy URL (e.g. `"http://127.0.0.1:8080"`).
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Configure whether to accept invalid TLS certificates (default: `false`).
    ///
    /// # Security
    /// Only useful for traffic inspection in controlled environments.
    pub fn danger_accept_invalid_certs(mut self, value: bool) -> Self {
        self.danger_accept_invalid_certs = value;
        self
    }

    /// Override the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the API base URL. Primarily useful for testing.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set a request timeout applied to all operations.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`Client`].
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed (e.g. invalid proxy URL).
    pub fn build(self) -> Result<Client> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs);

        if let Some(proxy_url) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build()?;

        Ok(Client {
            http,
            proxy: self.proxy,
            user_agent: self.user_agent,
            base_url: self.base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{DELETE, GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    fn client_for(server: &MockServer) -> Client {
        Client::builder()
            .base_url(server.base_url())
            .build()
            .expect("test client build failed")
    }

    #[tokio::test]
    async fn domains_reads_hydra_member() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/domains");
            then.status(200).json_body(json!({
                "hydra:member": [
                    { "id": "d1", "domain": "example.com", "isActive": true },
                    { "id": "d2", "domain": "example.org", "isActive": false }
                ],
                "hydra:totalItems": 2
            }));
        });

        let domains = client_for(&server).domains().await.unwrap();

        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].domain, "example.com");
        assert!(!domains[1].is_active);
        mock.assert();
    }

    #[tokio::test]
    async fn domains_without_member_is_a_parse_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/domains");
            then.status(200).json_body(json!({ "detail": "nope" }));
        });

        let err = client_for(&server).domains().await.unwrap_err();
        assert!(matches!(err, Error::ResponseParseContext { .. }));
    }

    #[tokio::test]
    async fn create_account_posts_credentials() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/accounts")
                .json_body(json!({ "address": "a@example.com", "password": "pw*Temp" }));
            then.status(201).json_body(json!({
                "id": "acc1",
                "address": "a@example.com",
                "createdAt": "2024-05-01T10:00:00+00:00"
            }));
        });

        let account = client_for(&server)
            .create_account("a@example.com", "pw*Temp")
            .await
            .unwrap();

        assert_eq!(account.id, "acc1");
        assert_eq!(account.address, "a@example.com");
        mock.assert();
    }

    #[tokio::test]
    async fn create_account_conflict_surfaces_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/accounts");
            then.status(422).body("address already used");
        });

        let err = client_for(&server)
            .create_account("a@example.com", "pw*Temp")
            .await
            .unwrap_err();

        match err {
            Error::Status { status, body, .. } => {
                assert_eq!(status, 422);
                assert_eq!(body, "address already used");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn messages_are_fetched_with_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/messages")
                .header("Authorization", "Bearer tok-1");
            then.status(200).json_body(json!({
                "hydra:member": [{
                    "id": "m1",
                    "from": { "address": "sender@example.net", "name": "Sender" },
                    "subject": "Hello",
                    "intro": "Hi there",
                    "createdAt": "2024-05-01T10:00:00+00:00",
                    "seen": false
                }]
            }));
        });

        let messages = client_for(&server).get_messages("tok-1").await.unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender(), "sender@example.net");
        assert!(messages[0].is_unread());
        mock.assert();
    }

    #[tokio::test]
    async fn delete_message_propagates_error_on_non_success_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/messages/m1");
            then.status(500).body("boom");
        });

        let result = client_for(&server).delete_message("tok", "m1").await;
        assert!(result.is_err(), "expected error on non-2xx delete_message");
        mock.assert();
    }

    #[tokio::test]
    async fn fetch_message_rejects_path_like_ids_without_a_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET);
            then.status(200);
        });

        let result = client_for(&server).fetch_message("tok", "../domains").await;

        assert!(result.is_err());
        mock.assert_hits(0);
    }
}
