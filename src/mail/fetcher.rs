use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use crate::domain::email::Email;
use crate::mail::gmail::MailSession;
use crate::mail::normalize::normalize_message;

/// Only the first page of results is read.
pub const PAGE_SIZE: u32 = 100;

pub fn unread_since_query(cutoff: DateTime<Utc>) -> String {
    format!("is:unread after:{}", cutoff.timestamp())
}

/// Unread mail received in the last `hours_back` hours.
pub fn fetch_recent_unread(
    session: &dyn MailSession,
    account_email: &str,
    hours_back: u32,
) -> Result<Vec<Email>> {
    let cutoff = Duration::try_hours(i64::from(hours_back))
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| anyhow!("lookback of {hours_back}h is out of range"))?;
    fetch_unread_since(session, account_email, cutoff)
}

/// A failed listing fails the whole account; a failed message is logged and skipped.
pub fn fetch_unread_since(
    session: &dyn MailSession,
    account_email: &str,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Email>> {
    let query = unread_since_query(cutoff);
    let refs = session
        .list_message_ids(&query, PAGE_SIZE)
        .with_context(|| format!("listing unread messages for {account_email}"))?;

    if refs.is_empty() {
        debug!("{account_email}: no unread messages since {cutoff}");
        return Ok(Vec::new());
    }
    if refs.len() >= PAGE_SIZE as usize {
        info!("{account_email}: listing hit {PAGE_SIZE} messages, older unread mail is left out");
    }

    let mut emails = Vec::with_capacity(refs.len());
    for r in &refs {
        match session.get_message(&r.id) {
            Ok(msg) => emails.push(normalize_message(&msg, account_email)),
            Err(e) => warn!("{account_email}: failed to fetch message {}: {e:#}", r.id),
        }
    }

    info!(
        "{account_email}: {} of {} unread messages fetched",
        emails.len(),
        refs.len()
    );
    Ok(emails)
}
