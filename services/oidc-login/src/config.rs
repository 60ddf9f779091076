//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The app secret is loaded from the OIDC_APP_SECRET env var or
//! app_secret_file, never stored in the TOML directly.

use common::Secret;
use oidc_client::ClientConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub oidc: OidcSettings,
    #[serde(default)]
    pub login: LoginSettings,
}

/// Tenant and application identity
#[derive(Debug, Deserialize)]
pub struct OidcSettings {
    pub endpoint: String,
    pub app_id: String,
    #[serde(skip)]
    pub app_secret: Option<Secret<String>>,
    /// Path to a file containing the app secret (alternative to OIDC_APP_SECRET)
    #[serde(default)]
    pub app_secret_file: Option<PathBuf>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Loopback redirect and local storage
#[derive(Debug, Deserialize)]
pub struct LoginSettings {
    #[serde(default = "default_redirect_addr")]
    pub redirect_addr: SocketAddr,
    #[serde(default = "default_callback_path")]
    pub callback_path: String,
    /// How long to wait for the browser to come back
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_token_store")]
    pub token_store: PathBuf,
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            redirect_addr: default_redirect_addr(),
            callback_path: default_callback_path(),
            timeout_secs: default_timeout(),
            token_store: default_token_store(),
            post_logout_redirect_uri: None,
        }
    }
}

fn default_redirect_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8765))
}

fn default_callback_path() -> String {
    "/callback".into()
}

fn default_timeout() -> u64 {
    300
}

fn default_token_store() -> PathBuf {
    PathBuf::from("oidc-login-tokens.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// App secret resolution order:
    /// 1. OIDC_APP_SECRET env var
    /// 2. app_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.oidc.endpoint.starts_with("http://")
            && !config.oidc.endpoint.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "endpoint must start with http:// or https://, got: {}",
                config.oidc.endpoint
            )));
        }

        if config.login.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if !config.login.callback_path.starts_with('/') {
            return Err(common::Error::Config(format!(
                "callback_path must start with '/', got: {}",
                config.login.callback_path
            )));
        }

        if let Ok(secret) = std::env::var("OIDC_APP_SECRET") {
            config.oidc.app_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oidc.app_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read app_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oidc.app_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("oidc-login.toml")
    }

    /// Redirect URI registered with the provider for this CLI.
    pub fn redirect_uri(&self) -> String {
        format!(
            "http://{}{}",
            self.login.redirect_addr, self.login.callback_path
        )
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new(&self.oidc.endpoint, &self.oidc.app_id)
            .with_scopes(self.oidc.scopes.clone())
            .with_resources(self.oidc.resources.clone())
            .with_token_store(self.login.token_store.clone());
        client.app_secret = self.oidc.app_secret.clone();
        client.prompt = self.oidc.prompt.clone();
        client
    }
}
