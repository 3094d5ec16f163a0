use chrono::{DateTime, FixedOffset};

use crate::domain::email::Email;
use crate::mail::decoders::decode_header_value;
use crate::mail::gmail::GmailMessage;

pub const UNREAD_LABEL: &str = "UNREAD";

/// Tried in order; the first one that parses wins.
const DATE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %e %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
];

/// Builds an [`Email`] out of a full-format API message. Missing data leaves fields empty.
pub fn normalize_message(msg: &GmailMessage, account_email: &str) -> Email {
    let mut email = Email {
        id: msg.id.clone(),
        account_email: account_email.to_string(),
        snippet: msg.snippet.clone(),
        is_unread: is_unread(&msg.label_ids),
        labels: msg.label_ids.iter().cloned().collect(),
        ..Default::default()
    };

    for header in msg.headers() {
        match header.name.as_str() {
            "From" => email.from = decode_header_value(&header.value),
            "Subject" => email.subject = decode_header_value(&header.value),
            "Date" => email.date = parse_email_date(&header.value),
            _ => {}
        }
    }

    email
}

pub fn is_unread(labels: &[String]) -> bool {
    labels.iter().any(|l| l == UNREAD_LABEL)
}

/// Parses a `Date:` header. Returns `None` for anything unrecognised.
pub fn parse_email_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    // drop a trailing "(UTC)"-style comment
    let value = match raw.find(" (") {
        Some(idx) => &raw[..idx],
        None => raw,
    }
    .trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc2822(value).ok())
}
