use chrono::{DateTime, FixedOffset};
use std::collections::BTreeSet;

pub type EmailId = String;

/// Provider-agnostic view of one message.
///
/// `id` and `account_email` are always set; everything else may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Email {
    pub id: EmailId,
    pub account_email: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub is_unread: bool,
    pub labels: BTreeSet<String>,
}

/// Unread mail of one account plus where to deliver it. Lives for one run.
#[derive(Debug, Clone)]
pub struct AccountDigest {
    pub webhook_url: String,
    pub emails: Vec<Email>,
}

impl AccountDigest {
    pub fn new(webhook_url: impl Into<String>, emails: Vec<Email>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            emails,
        }
    }
}
