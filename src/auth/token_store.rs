use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};
use log::debug;

const SERVICE: &str = "mail_digest";
pub const CLIENT_SECRET_ENV: &str = "OAUTH_CLIENT_SECRET";

/// Save a client secret into the keyring, keyed by client_id
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, client_id);
    entry?
        .set_password(client_secret)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load client secret from keyring by client_id
pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, client_id);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Keyring first, then the environment. A keyring that can't be reached counts as empty.
pub fn resolve_client_secret(client_id: &str) -> Option<String> {
    let from_keyring = match load_client_secret(client_id) {
        Ok(v) => v,
        Err(e) => {
            debug!("keyring unavailable: {e}");
            None
        }
    };
    from_keyring.or_else(|| std::env::var(CLIENT_SECRET_ENV).ok())
}
