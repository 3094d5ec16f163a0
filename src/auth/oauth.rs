use anyhow::{Result, anyhow};
use log::{error, info, warn};
use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Tokens returned by the oauth flow (in-memory)
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// OAuth client registration plus the provider endpoints.
#[derive(Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthClient {
    pub fn google(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    fn basic_client(&self) -> Result<BasicClient> {
        let client_id = ClientId::new(self.client_id.clone());
        let client_secret = self.client_secret.clone().map(ClientSecret::new);
        let auth_url = AuthUrl::new(self.auth_url.clone())?;
        let token_url = TokenUrl::new(self.token_url.clone())?;
        Ok(BasicClient::new(
            client_id,
            client_secret,
            auth_url,
            Some(token_url),
        ))
    }

    /// Exchange a refresh token for a new access token
    pub fn refresh_access_token(&self, refresh_token: &str) -> Result<Tokens> {
        let rt = RefreshToken::new(refresh_token.to_string());
        let token = self
            .basic_client()?
            .exchange_refresh_token(&rt)
            .request(http_client)?;

        Ok(Tokens {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
            expires_in: token.expires_in().map(|d| d.as_secs()),
        })
    }

    /// Authorization Code + PKCE flow. Opens the system browser and captures the
    /// code on a loopback listener bound to `redirect_uri`.
    pub fn perform_pkce_flow(&self, redirect_uri: &str, scope: &str) -> Result<Tokens> {
        let redirect = Url::parse(redirect_uri)
            .map_err(|e| anyhow!("Invalid redirect_uri '{redirect_uri}': {e}"))?;
        let host = redirect
            .host_str()
            .ok_or_else(|| anyhow!("redirect_uri missing host: {redirect_uri}"))?;
        let port = redirect
            .port_or_known_default()
            .ok_or_else(|| anyhow!("redirect_uri missing/unknown port: {redirect_uri}"))?;

        let bind_ip: IpAddr = match host {
            "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
            other => other.parse::<IpAddr>().map_err(|_| {
                anyhow!("redirect_uri host must be localhost/127.0.0.1 or an IP: {other}")
            })?,
        };
        let bind_addr = SocketAddr::new(bind_ip, port);

        // listen before handing out the URL so the redirect can't race us
        let server = Server::http(bind_addr)
            .map_err(|e| anyhow!("Failed to bind OAuth callback server on {bind_addr}: {e:?}"))?;

        let oauth_client = self
            .basic_client()?
            .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_token) = oauth_client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(scope.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        println!("Open this URL in your browser:\n{auth_url}");
        if let Err(e) = open::that(auth_url.as_str()) {
            warn!("could not open browser automatically: {e}");
        }

        let code = wait_for_code(&server, host, port, csrf_token.secret())?;

        let token = match oauth_client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request(http_client)
        {
            Ok(tok) => tok,
            Err(err) => {
                error!("token exchange failed: {err:#?}");
                return Err(anyhow!("Token exchange failed: {err}"));
            }
        };

        info!("authorization code exchanged");
        Ok(Tokens {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
            expires_in: token.expires_in().map(|d| d.as_secs()),
        })
    }
}

fn wait_for_code(server: &Server, host: &str, port: u16, expected_state: &str) -> Result<String> {
    let wait_until = Instant::now() + CALLBACK_TIMEOUT;

    while Instant::now() < wait_until {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        let Some(request) = maybe_request else {
            continue;
        };

        // request.url() is a path+query like "/callback?code=...&state=..."
        let full = format!("http://{}:{}{}", host, port, request.url());
        let Ok(parsed) = Url::parse(&full) else {
            let _ = request.respond(Response::from_string("Bad redirect"));
            continue;
        };

        let mut code = None;
        let mut state = None;
        for (k, v) in parsed.query_pairs() {
            match &*k {
                "code" => code = Some(v.into_owned()),
                "state" => state = Some(v.into_owned()),
                _ => {}
            }
        }

        match code {
            Some(code) if state.as_deref() == Some(expected_state) => {
                let _ = request.respond(Response::from_string(
                    "Authorization received. You can close this tab.",
                ));
                return Ok(code);
            }
            Some(_) => {
                let _ = request.respond(Response::from_string(
                    "State mismatch in redirect. You can close this tab.",
                ));
            }
            None => {
                let _ = request.respond(Response::from_string(
                    "No code found in redirect. You can close this tab.",
                ));
            }
        }
    }

    Err(anyhow!("No code received within timeout"))
}
