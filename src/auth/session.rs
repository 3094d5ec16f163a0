use anyhow::Result;
use reqwest::blocking::Client;

use crate::auth::token_manager::TokenManager;
use crate::config::{AccountConfig, Config};
use crate::mail::gmail::{GmailSession, MailSession};

/// Hands out an authenticated mailbox session per account.
pub trait SessionProvider: Sync {
    fn open_session(&self, account: &AccountConfig) -> Result<Box<dyn MailSession>>;
}

pub struct GmailSessionProvider {
    tokens: TokenManager,
    client: Client,
    api_base: String,
}

impl GmailSessionProvider {
    pub fn new(tokens: TokenManager, client: Client, api_base: impl Into<String>) -> Self {
        Self {
            tokens,
            client,
            api_base: api_base.into(),
        }
    }

    pub fn from_config(cfg: &Config, client: Client) -> Self {
        Self::new(TokenManager::from_config(cfg), client, cfg.api_base())
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }
}

impl SessionProvider for GmailSessionProvider {
    fn open_session(&self, account: &AccountConfig) -> Result<Box<dyn MailSession>> {
        let access_token = self.tokens.get_access_token(account)?;
        Ok(Box::new(GmailSession::new(
            self.client.clone(),
            self.api_base.clone(),
            access_token,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth::OAuthClient;
    use crate::auth::token_file::{TokenFile, save_tokens};
    use crate::testutil::LoopbackServer;
    use chrono::Utc;

    #[test]
    fn session_uses_the_accounts_token() {
        let dir = tempfile::tempdir().unwrap();
        let account = AccountConfig {
            email: "me@x.com".into(),
            token_path: dir.path().join("t.json"),
            webhook_url: "https://hook".into(),
        };
        save_tokens(
            &account.token_path,
            &TokenFile {
                access_token: Some("acct-token".into()),
                refresh_token: None,
                expires_at_epoch: Some(Utc::now().timestamp() + 3600),
            },
        )
        .unwrap();

        let server = LoopbackServer::start(vec![(200, r#"{"messages":[]}"#.into())]);
        let tokens = TokenManager {
            oauth: OAuthClient::google("cid", None),
            redirect_uri: "http://127.0.0.1:8080/callback".into(),
        };
        let provider = GmailSessionProvider::new(tokens, Client::new(), server.base_url());

        let session = provider.open_session(&account).unwrap();
        assert!(session.list_message_ids("is:unread", 100).unwrap().is_empty());

        let seen = server.finish();
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer acct-token"));
    }
}
