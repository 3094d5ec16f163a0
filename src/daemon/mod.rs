pub mod dispatcher;

use anyhow::{Context, Result, anyhow, bail};
use log::{error, info, warn};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use crate::auth::session::SessionProvider;
use crate::config::{AccountConfig, Config};
use crate::daemon::dispatcher::{DispatchReport, SEND_DELAY, dispatch};
use crate::digest::webhook::{WebhookSender, send_simple_message};
use crate::domain::email::{AccountDigest, Email};
use crate::mail::fetcher::fetch_recent_unread;

pub struct RunConfig {
    pub lookback_hours: u32,
    pub pacing: Duration,
}

impl RunConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            lookback_hours: cfg.lookback_hours,
            pacing: SEND_DELAY,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub failed_fetches: Vec<String>,
    pub emails_found: usize,
    pub delivery: Option<DispatchReport>,
}

fn fetch_account(
    provider: &dyn SessionProvider,
    account: &AccountConfig,
    lookback_hours: u32,
) -> Result<Vec<Email>> {
    let session = provider
        .open_session(account)
        .with_context(|| format!("opening session for {}", account.email))?;
    fetch_recent_unread(session.as_ref(), &account.email, lookback_hours)
}

/// Fetches every account on its own thread. Results keep the account order.
pub fn fetch_all<'a>(
    accounts: &'a [AccountConfig],
    provider: &dyn SessionProvider,
    lookback_hours: u32,
) -> Vec<(&'a AccountConfig, Result<Vec<Email>>)> {
    thread::scope(|s| {
        let handles: Vec<_> = accounts
            .iter()
            .map(|account| s.spawn(move || fetch_account(provider, account, lookback_hours)))
            .collect();

        handles
            .into_iter()
            .zip(accounts)
            .map(|(h, account)| {
                let result = h
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("fetch worker for {} panicked", account.email)));
                (account, result)
            })
            .collect()
    })
}

/// One polling pass: fetch all accounts, then deliver one digest per account
/// that has unread mail.
pub fn run_once(
    cfg: &Config,
    provider: &dyn SessionProvider,
    sender: &dyn WebhookSender,
    run: &RunConfig,
) -> Result<RunSummary> {
    if cfg.accounts.is_empty() {
        bail!("no accounts configured");
    }

    let mut summary = RunSummary::default();
    let mut digests = Vec::new();

    for (account, result) in fetch_all(&cfg.accounts, provider, run.lookback_hours) {
        match result {
            Ok(emails) if emails.is_empty() => {
                info!("{}: no unread mail", account.email);
            }
            Ok(emails) => {
                summary.emails_found += emails.len();
                digests.push((
                    account.email.clone(),
                    AccountDigest::new(account.webhook_url.clone(), emails),
                ));
            }
            Err(e) => {
                error!("{}: fetch failed: {e:#}", account.email);
                summary.failed_fetches.push(account.email.clone());
            }
        }
    }

    if digests.is_empty() {
        info!("no unread mail in the last {}h", run.lookback_hours);
        return Ok(summary);
    }

    let report = dispatch(&digests, sender, run.pacing)?;
    info!(
        "delivered {} of {} digests",
        report.sent.len(),
        report.attempted()
    );
    summary.delivery = Some(report);
    Ok(summary)
}

/// Runs [`run_once`] every `interval` until Ctrl-C.
pub fn run_watch(
    cfg: &Config,
    provider: &dyn SessionProvider,
    sender: &dyn WebhookSender,
    run: &RunConfig,
    interval: Duration,
) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r2 = running.clone();
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
    })?;

    watch_loop(&running, cfg, provider, sender, run, interval);
    info!("stopped");
    Ok(())
}

fn watch_loop(
    running: &AtomicBool,
    cfg: &Config,
    provider: &dyn SessionProvider,
    sender: &dyn WebhookSender,
    run: &RunConfig,
    interval: Duration,
) {
    while running.load(Ordering::SeqCst) {
        if let Err(e) = run_once(cfg, provider, sender, run) {
            error!("run failed: {e:#}");
        }

        let wake_at = Instant::now() + interval;
        while running.load(Ordering::SeqCst) && Instant::now() < wake_at {
            thread::sleep(Duration::from_millis(200).min(interval));
        }
    }
}

/// Posts a plain test message to every configured webhook.
pub fn ping_webhooks(
    cfg: &Config,
    sender: &dyn WebhookSender,
    message: &str,
    pacing: Duration,
) -> Result<usize> {
    if cfg.accounts.is_empty() {
        bail!("no accounts configured");
    }

    let mut ok = 0;
    for (i, account) in cfg.accounts.iter().enumerate() {
        if i > 0 && !pacing.is_zero() {
            thread::sleep(pacing);
        }
        match send_simple_message(sender, &account.webhook_url, message) {
            Ok(()) => ok += 1,
            Err(e) => warn!(
                "{}: webhook test failed: {:#}",
                account.email,
                anyhow::Error::from(e)
            ),
        }
    }
    Ok(ok)
}
