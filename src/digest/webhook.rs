use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest::format::compose_description;
use crate::domain::email::Email;

pub const FOOTER_TEXT: &str = "Email Monitor";
const EMPTY_CONTENT: &str = "Empty message";

/// Blue, red, purple, gold, green.
pub const PALETTE: [u32; 5] = [3447003, 15158332, 10181046, 15844367, 3066993];

/// JSON body accepted by Discord-style webhooks. Empty fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookMessage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub color: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footer {
    pub text: String,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("failed to send webhook")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Posts one message to one webhook. Exactly one attempt.
pub trait WebhookSender {
    fn send(&self, webhook_url: &str, message: &WebhookMessage) -> Result<(), DeliveryError>;
}

#[derive(Clone, Default)]
pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl WebhookSender for HttpWebhookSender {
    fn send(&self, webhook_url: &str, message: &WebhookMessage) -> Result<(), DeliveryError> {
        let resp = self.client.post(webhook_url).json(message).send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("webhook accepted message ({})", status.as_u16());
        Ok(())
    }
}

/// Colors cycle through [`PALETTE`]; `account_num` starts at 1.
pub fn color_for_account(account_num: usize) -> u32 {
    PALETTE[account_num.saturating_sub(1) % PALETTE.len()]
}

/// The single-embed digest for one account.
pub fn build_account_message(
    account: &str,
    emails: &[Email],
    account_num: usize,
    sent_at: DateTime<Utc>,
) -> WebhookMessage {
    let embed = Embed {
        title: format!("Account {account_num}: {account}"),
        description: compose_description(emails),
        color: color_for_account(account_num),
        timestamp: sent_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        footer: Some(Footer {
            text: FOOTER_TEXT.to_string(),
        }),
    };

    WebhookMessage {
        embeds: vec![embed],
        ..Default::default()
    }
}

/// A plain-text message with no embeds.
pub fn send_simple_message(
    sender: &dyn WebhookSender,
    webhook_url: &str,
    content: &str,
) -> Result<(), DeliveryError> {
    let content = if content.is_empty() {
        EMPTY_CONTENT
    } else {
        content
    };
    let message = WebhookMessage {
        content: content.to_string(),
        ..Default::default()
    };
    sender.send(webhook_url, &message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::LoopbackServer;

    fn emails(n: usize) -> Vec<Email> {
        (0..n)
            .map(|i| Email {
                id: format!("m{i}"),
                account_email: "me@x.com".into(),
                from: "Jane <jane@x.com>".into(),
                subject: format!("Subject {i}"),
                ..Default::default()
            })
            .collect()
    }

    fn sent_at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    #[test]
    fn colors_cycle_through_palette() {
        assert_eq!(color_for_account(1), 3447003);
        assert_eq!(color_for_account(5), 3066993);
        assert_eq!(color_for_account(6), color_for_account(1));
        assert_eq!(color_for_account(7), color_for_account(2));
    }

    #[test]
    fn account_message_has_one_embed() {
        let msg = build_account_message("me@x.com", &emails(3), 2, sent_at());

        assert!(msg.content.is_empty());
        assert_eq!(msg.embeds.len(), 1);
        let embed = &msg.embeds[0];
        assert_eq!(embed.title, "Account 2: me@x.com");
        assert!(embed.description.starts_with("**Number of emails: 3**"));
        assert_eq!(embed.color, 15158332);
        assert_eq!(embed.timestamp, "2025-10-09T08:53:20Z");
        assert_eq!(embed.footer.as_ref().unwrap().text, "Email Monitor");
    }

    #[test]
    fn empty_fields_are_omitted_from_json() {
        let simple = WebhookMessage {
            content: "hello".into(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&simple).unwrap(), r#"{"content":"hello"}"#);

        let embed_only = WebhookMessage {
            embeds: vec![Embed {
                title: "t".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&embed_only).unwrap(),
            r#"{"embeds":[{"title":"t"}]}"#
        );
    }

    #[test]
    fn posts_json_and_accepts_2xx() {
        let server = LoopbackServer::start(vec![(204, String::new())]);
        let sender = HttpWebhookSender::default();
        let url = format!("{}/api/webhooks/1/abc", server.base_url());
        let msg = build_account_message("me@x.com", &emails(1), 1, sent_at());

        sender.send(&url, &msg).unwrap();

        let seen = server.finish();
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].url, "/api/webhooks/1/abc");
        assert_eq!(seen[0].content_type.as_deref(), Some("application/json"));
        let body: WebhookMessage = serde_json::from_str(&seen[0].body).unwrap();
        assert_eq!(body, msg);
    }

    #[test]
    fn non_2xx_is_a_failure_with_body() {
        let server = LoopbackServer::start(vec![(400, r#"{"message":"Invalid Form Body"}"#.into())]);
        let sender = HttpWebhookSender::default();

        let err = sender
            .send(&server.base_url(), &WebhookMessage::default())
            .unwrap_err();
        match err {
            DeliveryError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid Form Body"));
            }
            other => panic!("unexpected error: {other}"),
        }
        server.finish();
    }

    #[test]
    fn unreachable_endpoint_is_an_http_error() {
        let sender = HttpWebhookSender::default();
        let err = sender
            .send("http://127.0.0.1:9/none", &WebhookMessage::default())
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Http(_)));

        let chain = anyhow::Error::from(err);
        assert!(chain.chain().count() >= 2);
        assert!(format!("{chain:#}").starts_with("failed to send webhook: "));
    }

    #[test]
    fn simple_message_replaces_empty_content() {
        let server = LoopbackServer::start(vec![(200, String::new()), (200, String::new())]);
        let sender = HttpWebhookSender::default();

        send_simple_message(&sender, &server.base_url(), "").unwrap();
        send_simple_message(&sender, &server.base_url(), "ping").unwrap();

        let seen = server.finish();
        assert_eq!(seen[0].body, r#"{"content":"Empty message"}"#);
        assert_eq!(seen[1].body, r#"{"content":"ping"}"#);
    }
}
