use chrono::Utc;
use log::{error, info};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::digest::webhook::{WebhookSender, build_account_message};
use crate::domain::email::AccountDigest;

/// Fixed pause between two webhook posts; webhooks are rate limited per channel.
pub const SEND_DELAY: Duration = Duration::from_millis(500);

#[derive(Error, Debug, PartialEq)]
pub enum DispatchError {
    #[error("no emails to send")]
    NothingToSend,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub sent: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.sent.len() + self.failed.len()
    }
}

/// Sends one digest per account, in order. A failed send is logged and the
/// remaining accounts are still attempted.
pub fn dispatch(
    digests: &[(String, AccountDigest)],
    sender: &dyn WebhookSender,
    pacing: Duration,
) -> Result<DispatchReport, DispatchError> {
    if digests.is_empty() {
        return Err(DispatchError::NothingToSend);
    }

    let mut report = DispatchReport::default();

    for (i, (account, digest)) in digests.iter().enumerate() {
        if i > 0 && !pacing.is_zero() {
            thread::sleep(pacing);
        }

        let account_num = i + 1;
        info!(
            "sending digest for {account} ({} emails)",
            digest.emails.len()
        );

        let message = build_account_message(account, &digest.emails, account_num, Utc::now());
        match sender.send(&digest.webhook_url, &message) {
            Ok(()) => {
                info!("sent digest for {account}");
                report.sent.push(account.clone());
            }
            Err(e) => {
                let e = anyhow::Error::from(e);
                error!("failed to send digest for {account}: {e:#}");
                report.failed.push((account.clone(), format!("{e:#}")));
            }
        }
    }

    Ok(report)
}
