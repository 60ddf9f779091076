//! OIDC login CLI
//!
//! Signs a user in against an OIDC provider from the terminal:
//! 1. Loads the TOML config (app identity, loopback redirect, token store)
//! 2. Prints the authorization URL and captures the redirect on a loopback listener
//! 3. Exchanges the code, verifies the ID token and saves the tokens
//!
//! Later invocations reuse the saved tokens for `access-token`, `user-info`
//! and `status`, and `sign-out` clears them.

mod browser;
mod config;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use oidc_client::{BrowserAuthSession, Client};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::browser::LoopbackBrowser;
use crate::config::Config;

const USAGE: &str = "usage: oidc-login [--config PATH] \
    <sign-in | sign-out | access-token [--resource URI] | user-info | status>";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, PartialEq, Eq)]
enum Command {
    SignIn,
    SignOut,
    AccessToken { resource: Option<String> },
    UserInfo,
    Status,
}

struct Args {
    config_path: Option<String>,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut config_path = None;
    let mut resource = None;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                config_path = Some(iter.next().context("--config needs a path")?.clone());
            }
            "--resource" => {
                resource = Some(iter.next().context("--resource needs a URI")?.clone());
            }
            "-h" | "--help" => bail!("{USAGE}"),
            other if other.starts_with("--") => bail!("unknown flag {other}\n{USAGE}"),
            other => positional.push(other),
        }
    }

    let command = match positional.as_slice() {
        ["sign-in"] => Command::SignIn,
        ["sign-out"] => Command::SignOut,
        ["access-token"] => Command::AccessToken { resource: resource.take() },
        ["user-info"] => Command::UserInfo,
        ["status"] => Command::Status,
        [] => bail!("missing command\n{USAGE}"),
        other => bail!("unknown command {:?}\n{USAGE}", other.join(" ")),
    };

    if resource.is_some() {
        bail!("--resource is only valid with access-token");
    }

    Ok(Args {
        config_path,
        command,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for tokens and JSON output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let config_path = Config::resolve_path(args.config_path.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let client_config = config.client_config();
    client_config
        .validate()
        .context("invalid [oidc] settings")?;

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let client = Client::new(client_config)
        .await
        .context("failed to open token store")?
        .with_http_client(http);

    let loaded = client.config();
    info!(
        endpoint = %loaded.endpoint,
        app_id = %loaded.app_id,
        token_store = ?loaded.token_store_path,
        confidential = loaded.app_secret.is_some(),
        "configuration loaded"
    );

    match args.command {
        Command::SignIn => sign_in(&client, &config).await,
        Command::SignOut => {
            let end_session = client
                .sign_out(config.login.post_logout_redirect_uri.as_deref())
                .await?;
            match end_session {
                Some(uri) => {
                    println!("Signed out locally. To end the provider session, open:\n\n  {uri}\n")
                }
                None => println!("Signed out."),
            }
            Ok(())
        }
        Command::AccessToken { resource } => {
            let token = client.get_access_token(resource.as_deref()).await?;
            println!("{token}");
            Ok(())
        }
        Command::UserInfo => {
            let info = client.fetch_user_info().await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Command::Status => {
            let claims = client.id_token_claims().await?;
            let status = serde_json::json!({
                "authenticated": claims.is_some(),
                "sub": claims.as_ref().map(|c| c.sub.clone()),
                "username": claims.as_ref().and_then(|c| c.username.clone()),
                "id_token_expires_at": claims.as_ref().map(|c| c.exp),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

async fn sign_in(client: &Client, config: &Config) -> Result<()> {
    let browser = LoopbackBrowser::new(
        config.login.redirect_addr,
        Duration::from_secs(config.login.timeout_secs),
    );
    let session = BrowserAuthSession::new(browser);
    let redirect_uri = config.redirect_uri();

    // Dropping the sign-in future on Ctrl-C leaves the saved tokens untouched
    tokio::select! {
        result = client.sign_in_with_browser(&session, &redirect_uri, None) => result?,
        _ = tokio::signal::ctrl_c() => bail!("sign-in interrupted"),
    }

    let claims = client.id_token_claims().await?;
    match claims {
        Some(claims) => println!(
            "Signed in as {}",
            claims.username.as_deref().unwrap_or(&claims.sub)
        ),
        None => println!("Signed in."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse_args(&args(&["sign-in"])).unwrap().command, Command::SignIn);
        assert_eq!(parse_args(&args(&["sign-out"])).unwrap().command, Command::SignOut);
        assert_eq!(parse_args(&args(&["user-info"])).unwrap().command, Command::UserInfo);
        assert_eq!(parse_args(&args(&["status"])).unwrap().command, Command::Status);
    }

    #[test]
    fn parses_config_flag_anywhere() {
        let parsed = parse_args(&args(&["status", "--config", "/etc/oidc.toml"])).unwrap();
        assert_eq!(parsed.config_path.as_deref(), Some("/etc/oidc.toml"));

        let parsed = parse_args(&args(&["--config", "/etc/oidc.toml", "status"])).unwrap();
        assert_eq!(parsed.config_path.as_deref(), Some("/etc/oidc.toml"));
        assert_eq!(parsed.command, Command::Status);
    }

    #[test]
    fn parses_access_token_resource() {
        let parsed =
            parse_args(&args(&["access-token", "--resource", "https://api.example.com"])).unwrap();
        assert_eq!(
            parsed.command,
            Command::AccessToken {
                resource: Some("https://api.example.com".into())
            }
        );

        let parsed = parse_args(&args(&["access-token"])).unwrap();
        assert_eq!(parsed.command, Command::AccessToken { resource: None });
    }

    #[test]
    fn rejects_resource_on_other_commands() {
        let err = parse_args(&args(&["status", "--resource", "https://api.example.com"]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("--resource"));
    }

    #[test]
    fn rejects_missing_or_unknown_command() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["log-in"])).is_err());
        assert!(parse_args(&args(&["status", "extra"])).is_err());
        assert!(parse_args(&args(&["--verbose", "status"])).is_err());
    }

    #[test]
    fn flag_without_value_is_an_error() {
        let err = parse_args(&args(&["status", "--config"])).err().unwrap();
        assert!(err.to_string().contains("--config"));
    }
}
