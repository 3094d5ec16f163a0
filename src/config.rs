use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::mail::gmail::GMAIL_API_BASE;

pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;
/// Ten years.
pub const MAX_LOOKBACK_HOURS: u32 = 24 * 365 * 10;
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    pub api_base: Option<String>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// One monitored mailbox and the webhook its digest goes to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccountConfig {
    pub email: String,
    pub token_path: PathBuf,
    pub webhook_url: String,
}

fn default_lookback_hours() -> u32 {
    DEFAULT_LOOKBACK_HOURS
}

impl Config {
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI)
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(GMAIL_API_BASE)
    }

    pub fn account(&self, email: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.email == email)
    }

    pub fn validate(&self) -> Result<()> {
        check_lookback_hours(self.lookback_hours)?;

        let mut seen = HashSet::new();
        for (i, account) in self.accounts.iter().enumerate() {
            let n = i + 1;
            if account.email.trim().is_empty() {
                bail!("account {n}: email is empty");
            }
            if !seen.insert(account.email.as_str()) {
                bail!("account {n}: {} is configured twice", account.email);
            }

            let url = Url::parse(&account.webhook_url)
                .with_context(|| format!("account {n}: invalid webhook_url"))?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!(
                    "account {n}: webhook_url must be http(s), got {}",
                    url.scheme()
                );
            }
        }
        Ok(())
    }

    /// Token paths in the file are relative to the file's directory.
    fn resolve_token_paths(&mut self, base: &Path) {
        for account in &mut self.accounts {
            if account.token_path.is_relative() {
                account.token_path = base.join(&account.token_path);
            }
        }
    }
}

pub fn check_lookback_hours(hours: u32) -> Result<()> {
    if hours == 0 {
        bail!("lookback_hours must be at least 1");
    }
    if hours > MAX_LOOKBACK_HOURS {
        bail!("lookback_hours must be at most {MAX_LOOKBACK_HOURS}, got {hours}");
    }
    Ok(())
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join("mail_digest"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

/// Loads the default config file, writing a template first if there is none.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        write_template(path)?;
        return Err(anyhow!(
            "Created template config at {}; edit it and run again",
            path.display()
        ));
    }

    let s = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut cfg: Config =
        toml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    cfg.validate()?;

    if let Some(base) = path.parent() {
        cfg.resolve_token_paths(base);
    }
    Ok(cfg)
}

fn write_template(path: &Path) -> Result<()> {
    let sample = Config {
        client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
        redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
        lookback_hours: DEFAULT_LOOKBACK_HOURS,
        api_base: None,
        accounts: vec![AccountConfig {
            email: "you@example.com".to_string(),
            token_path: PathBuf::from("tokens/account1.json"),
            webhook_url: "https://discord.com/api/webhooks/ID/TOKEN".to_string(),
        }],
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tom = toml::to_string_pretty(&sample)?;
    fs::write(path, tom)?;
    Ok(())
}
