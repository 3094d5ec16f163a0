use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Per-account OAuth tokens, stored as JSON at the account's `token_path`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenFile {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // epoch seconds
}

impl TokenFile {
    /// The access token, if it is still valid `skew_secs` from `now`.
    pub fn live_access_token(&self, now: i64, skew_secs: i64) -> Option<&str> {
        match (&self.access_token, self.expires_at_epoch) {
            (Some(at), Some(exp)) if now + skew_secs < exp => Some(at),
            _ => None,
        }
    }
}

pub fn save_tokens(path: &Path, tokens: &TokenFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let s = serde_json::to_string_pretty(tokens)?;
    fs::write(path, s).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Load the token file if present
pub fn load_tokens(path: &Path) -> Result<Option<TokenFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path)?;
    let tf: TokenFile =
        serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(tf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens").join("a.json");
        assert!(load_tokens(&path).unwrap().is_none());

        let tf = TokenFile {
            access_token: Some("at".into()),
            refresh_token: Some("rt".into()),
            expires_at_epoch: Some(1_000),
        };
        save_tokens(&path, &tf).unwrap();
        assert_eq!(load_tokens(&path).unwrap(), Some(tf));
    }

    #[test]
    fn access_token_expires_with_skew() {
        let tf = TokenFile {
            access_token: Some("at".into()),
            refresh_token: None,
            expires_at_epoch: Some(1_000),
        };
        assert_eq!(tf.live_access_token(900, 60), Some("at"));
        assert_eq!(tf.live_access_token(950, 60), None);
        assert_eq!(TokenFile::default().live_access_token(0, 0), None);
    }
}
