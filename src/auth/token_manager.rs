use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use log::{debug, info};

use crate::auth::oauth::{GMAIL_READONLY_SCOPE, OAuthClient, Tokens};
use crate::auth::token_file::{TokenFile, load_tokens, save_tokens};
use crate::auth::token_store;
use crate::config::{AccountConfig, Config};

/// Treat access tokens as expired this many seconds early.
const EXPIRY_SKEW_SECS: i64 = 60;
/// Used when the provider doesn't say how long a token lives.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3500;

#[derive(Clone)]
pub struct TokenManager {
    pub oauth: OAuthClient,
    pub redirect_uri: String,
}

impl TokenManager {
    pub fn from_config(cfg: &Config) -> Self {
        let client_secret = token_store::resolve_client_secret(&cfg.client_id);
        Self {
            oauth: OAuthClient::google(cfg.client_id.clone(), client_secret),
            redirect_uri: cfg.redirect_uri().to_string(),
        }
    }

    /// Returns a valid access token for the account, refreshing it if needed.
    /// Never prompts; accounts without a refresh token need `authorize` first.
    pub fn get_access_token(&self, account: &AccountConfig) -> Result<String> {
        let now = Utc::now().timestamp();
        let cached = load_tokens(&account.token_path)?.unwrap_or_default();

        if let Some(at) = cached.live_access_token(now, EXPIRY_SKEW_SECS) {
            debug!("{}: using cached access token", account.email);
            return Ok(at.to_string());
        }

        let rt = cached.refresh_token.clone().ok_or_else(|| {
            anyhow!(
                "{}: no refresh token in {}; run `mail_digest authorize --account {}`",
                account.email,
                account.token_path.display(),
                account.email
            )
        })?;

        debug!("{}: refreshing access token", account.email);
        let t = self
            .oauth
            .refresh_access_token(&rt)
            .with_context(|| format!("{}: refreshing access token", account.email))?;
        let access = t.access_token.clone();
        self.store(account, t, Some(rt), now)?;
        Ok(access)
    }

    /// Interactive PKCE authorization for one account; persists the tokens.
    pub fn authorize(&self, account: &AccountConfig) -> Result<()> {
        let now = Utc::now().timestamp();
        let t = self
            .oauth
            .perform_pkce_flow(&self.redirect_uri, GMAIL_READONLY_SCOPE)?;
        if t.refresh_token.is_none() {
            return Err(anyhow!(
                "{}: provider returned no refresh token",
                account.email
            ));
        }
        self.store(account, t, None, now)?;
        info!(
            "{}: tokens saved to {}",
            account.email,
            account.token_path.display()
        );
        Ok(())
    }

    fn store(
        &self,
        account: &AccountConfig,
        t: Tokens,
        previous_refresh: Option<String>,
        now: i64,
    ) -> Result<()> {
        let lifetime = t
            .expires_in
            .and_then(|s| i64::try_from(s).ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let tf = TokenFile {
            access_token: Some(t.access_token),
            refresh_token: t.refresh_token.or(previous_refresh),
            expires_at_epoch: Some(now + lifetime),
        };
        save_tokens(&account.token_path, &tf)
    }
}
