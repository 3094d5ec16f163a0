use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use mail_digest::auth::session::GmailSessionProvider;
use mail_digest::auth::token_store;
use mail_digest::config::{Config, check_lookback_hours, load_config, load_config_from};
use mail_digest::daemon::{RunConfig, ping_webhooks, run_once, run_watch};
use mail_digest::digest::webhook::HttpWebhookSender;

#[derive(Parser)]
#[command(name = "mail_digest")]
#[command(about = "Unread-mail digests from Gmail to Discord webhooks", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/mail_digest/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch unread mail once and send the digests
    Run {
        /// Override lookback_hours from the config
        #[arg(long)]
        hours: Option<u32>,
    },

    /// Repeat `run` until Ctrl-C
    Watch {
        /// Seconds between runs
        #[arg(long, default_value_t = 3600)]
        interval: u64,

        #[arg(long)]
        hours: Option<u32>,
    },

    /// Post a plain test message to every configured webhook
    Ping {
        #[arg(long, default_value = "mail_digest webhook test")]
        message: String,
    },

    /// Run the browser OAuth flow for one account and save its tokens
    Authorize {
        #[arg(long)]
        account: String,
    },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn load(path: Option<&PathBuf>) -> Result<Config> {
    let loaded = match path {
        Some(p) => load_config_from(p),
        None => load_config(),
    };
    loaded.map_err(|e| anyhow!("Configuration error: {e:#}"))
}

fn run_config(cfg: &Config, hours: Option<u32>) -> Result<RunConfig> {
    let mut run = RunConfig::from_config(cfg);
    if let Some(h) = hours {
        check_lookback_hours(h).map_err(|e| anyhow!("--hours: {e}"))?;
        run.lookback_hours = h;
    }
    Ok(run)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let http = reqwest::blocking::Client::new();

    match cli.cmd {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            token_store::save_client_secret(&client_id, secret)?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        Command::Authorize { account } => {
            let cfg = load(cli.config.as_ref())?;
            let acct = cfg
                .account(&account)
                .ok_or_else(|| anyhow!("{account} is not in the config"))?;
            let provider = GmailSessionProvider::from_config(&cfg, http);
            provider.tokens().authorize(acct)?;
            println!("Authorized {account}");
            Ok(())
        }

        Command::Run { hours } => {
            let cfg = load(cli.config.as_ref())?;
            let run = run_config(&cfg, hours)?;
            let provider = GmailSessionProvider::from_config(&cfg, http.clone());
            let sender = HttpWebhookSender::new(http);

            let summary = run_once(&cfg, &provider, &sender, &run)?;
            if !summary.failed_fetches.is_empty() {
                eprintln!(
                    "Could not fetch: {}",
                    summary.failed_fetches.join(", ")
                );
            }
            Ok(())
        }

        Command::Watch { interval, hours } => {
            let cfg = load(cli.config.as_ref())?;
            let run = run_config(&cfg, hours)?;
            let provider = GmailSessionProvider::from_config(&cfg, http.clone());
            let sender = HttpWebhookSender::new(http);

            run_watch(
                &cfg,
                &provider,
                &sender,
                &run,
                Duration::from_secs(interval.max(1)),
            )
        }

        Command::Ping { message } => {
            let cfg = load(cli.config.as_ref())?;
            let sender = HttpWebhookSender::new(http);
            let run = RunConfig::from_config(&cfg);

            let ok = ping_webhooks(&cfg, &sender, &message, run.pacing)?;
            println!("{ok} of {} webhooks accepted the test message", cfg.accounts.len());
            Ok(())
        }
    }
}
