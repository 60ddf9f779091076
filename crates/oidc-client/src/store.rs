//! Token persistence
//!
//! A JSON file mapping app IDs to the tokens the client holds for them.
//! Writes go through a temp file + rename so a crash mid-write leaves the
//! previous contents intact; a tokio Mutex serializes writers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::access_token::AccessToken;
use crate::error::{Error, Result};

/// Tokens held for one app. Also the client's in-memory token state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret<String>>,
    /// Keyed by [`access_token_key`](crate::access_token_key)
    #[serde(default)]
    pub access_tokens: HashMap<String, AccessToken>,
}

impl StoredTokens {
    pub fn is_empty(&self) -> bool {
        self.id_token.is_none() && self.refresh_token.is_none() && self.access_tokens.is_empty()
    }
}

pub struct TokenStore {
    path: PathBuf,
    state: Mutex<HashMap<String, StoredTokens>>,
}

impl TokenStore {
    /// Load tokens from `path`, creating the file as `{}` when it does not
    /// exist yet.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Storage(format!("reading token file: {e}")))?;
            let tokens: HashMap<String, StoredTokens> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), apps = tokens.len(), "loaded token store");
            tokens
        } else {
            info!(path = %path.display(), "token file not found, starting with empty store");
            let store = HashMap::new();
            write_atomic(&path, &store).await?;
            store
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, app_id: &str) -> Option<StoredTokens> {
        let state = self.state.lock().await;
        state.get(app_id).cloned()
    }

    /// Replace the tokens for `app_id` and persist. Empty token sets are
    /// removed instead of written.
    pub async fn save(&self, app_id: &str, tokens: StoredTokens) -> Result<()> {
        let mut state = self.state.lock().await;
        if tokens.is_empty() {
            state.remove(app_id);
        } else {
            state.insert(app_id.to_string(), tokens);
        }
        debug!(app_id, "saved tokens");
        write_atomic(&self.path, &state).await
    }

    /// Remove the tokens for `app_id` and persist. Returns what was stored.
    pub async fn remove(&self, app_id: &str) -> Result<Option<StoredTokens>> {
        let mut state = self.state.lock().await;
        let removed = state.remove(app_id);
        if removed.is_some() {
            debug!(app_id, "removed tokens");
            write_atomic(&self.path, &state).await?;
        }
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Write to a temp file in the target directory, restrict it to 0600, then
/// rename it over the target.
async fn write_atomic(path: &Path, data: &HashMap<String, StoredTokens>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing tokens: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage("token store path has no parent directory".into()))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Storage("token store path has no file name".into()))?;
    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted tokens");
    Ok(())
}
