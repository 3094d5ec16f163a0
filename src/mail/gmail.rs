use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

// --- Gmail API response types ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl GmailMessage {
    pub fn headers(&self) -> &[Header] {
        self.payload
            .as_ref()
            .map(|p| p.headers.as_slice())
            .unwrap_or_default()
    }
}

/// An authenticated handle able to list and fetch messages of one mailbox.
pub trait MailSession {
    fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>>;
    fn get_message(&self, id: &str) -> Result<GmailMessage>;
}

pub struct GmailSession {
    client: Client,
    api_base: String,
    access_token: String,
}

impl GmailSession {
    pub fn new(client: Client, api_base: impl Into<String>, access_token: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .with_context(|| format!("request {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("gmail returned status {}: {}", status.as_u16(), body));
        }

        resp.json::<T>()
            .with_context(|| format!("decode response from {url}"))
    }
}

impl MailSession for GmailSession {
    fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
        let url = format!("{}/users/me/messages", self.api_base);
        let list: MessageList = self.get_json(
            &url,
            &[("q", query.to_string()), ("maxResults", max_results.to_string())],
        )?;
        Ok(list.messages)
    }

    fn get_message(&self, id: &str) -> Result<GmailMessage> {
        let url = format!("{}/users/me/messages/{}", self.api_base, id);
        self.get_json(&url, &[("format", "full".to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::LoopbackServer;

    #[test]
    fn lists_and_fetches_with_bearer_token() {
        let server = LoopbackServer::start(vec![
            (200, r#"{"messages":[{"id":"m1","threadId":"t1"},{"id":"m2"}],"resultSizeEstimate":2}"#.into()),
            (
                200,
                r#"{"id":"m1","labelIds":["UNREAD","INBOX"],"snippet":"hi there",
                   "payload":{"mimeType":"text/plain","headers":[{"name":"Subject","value":"Hello"}]}}"#
                    .into(),
            ),
        ]);
        let session = GmailSession::new(Client::new(), server.base_url(), "tok-123");

        let ids = session.list_message_ids("is:unread after:100", 100).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].id, "m1");
        assert_eq!(ids[1].id, "m2");

        let msg = session.get_message("m1").unwrap();
        assert_eq!(msg.label_ids, vec!["UNREAD", "INBOX"]);
        assert_eq!(msg.headers()[0].value, "Hello");

        let seen = server.finish();
        assert!(seen[0].url.starts_with("/users/me/messages?"));
        assert!(seen[0].url.contains("maxResults=100"));
        assert!(seen[0].url.contains("q=is%3Aunread+after%3A100"));
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer tok-123"));
        assert_eq!(seen[1].url, "/users/me/messages/m1?format=full");
    }

    #[test]
    fn empty_listing_has_no_messages() {
        let server = LoopbackServer::start(vec![(200, r#"{"resultSizeEstimate":0}"#.into())]);
        let session = GmailSession::new(Client::new(), server.base_url(), "tok");

        assert!(session.list_message_ids("is:unread", 100).unwrap().is_empty());
        server.finish();
    }

    #[test]
    fn error_status_carries_body() {
        let server = LoopbackServer::start(vec![(403, "quota exceeded".into())]);
        let session = GmailSession::new(Client::new(), server.base_url(), "tok");

        let err = session.list_message_ids("is:unread", 100).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("403"), "{msg}");
        assert!(msg.contains("quota exceeded"), "{msg}");
        server.finish();
    }
}
