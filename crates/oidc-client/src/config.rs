//! Client configuration

use std::path::PathBuf;

use common::Secret;

/// Identity of the application and tenant the client signs in against.
///
/// Built in code (or from the `oidc-login` TOML file) and validated once
/// before the client is constructed.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Tenant base URL, e.g. `https://tenant.example.com`. Discovery is
    /// fetched from `{endpoint}/oidc/.well-known/openid-configuration`.
    pub endpoint: String,
    pub app_id: String,
    /// Present only for confidential clients
    pub app_secret: Option<Secret<String>>,
    /// Requested in addition to the reserved scopes
    pub scopes: Vec<String>,
    pub resources: Vec<String>,
    /// `None` uses the provider default prompt (`consent`)
    pub prompt: Option<String>,
    /// Where tokens are persisted between runs. `None` keeps them in memory.
    pub token_store_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            app_id: app_id.into(),
            app_secret: None,
            scopes: Vec::new(),
            resources: Vec::new(),
            prompt: None,
            token_store_path: None,
        }
    }

    #[must_use]
    pub fn with_app_secret(mut self, secret: impl Into<String>) -> Self {
        self.app_secret = Some(Secret::new(secret.into()));
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_token_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_store_path = Some(path.into());
        self
    }

    pub fn validate(&self) -> common::Result<()> {
        if !self.endpoint.starts_with("https://") && !self.endpoint.starts_with("http://") {
            return Err(common::Error::Config(format!(
                "endpoint must start with http:// or https://, got {:?}",
                self.endpoint
            )));
        }

        if self.app_id.trim().is_empty() {
            return Err(common::Error::Config("app_id must not be empty".into()));
        }

        if let Some(secret) = &self.app_secret
            && secret.expose().is_empty()
        {
            return Err(common::Error::Config(
                "app secret is set but empty".into(),
            ));
        }

        if self.resources.iter().any(|r| r.trim().is_empty()) {
            return Err(common::Error::Config(
                "resources must not contain empty entries".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = ClientConfig::new("https://tenant.example.com", "app-123")
            .with_app_secret("shh")
            .with_scopes(vec!["email".into()])
            .with_resources(vec!["https://api.example.com".into()])
            .with_prompt("login")
            .with_token_store("/tmp/tokens.json");

        assert_eq!(config.app_secret.as_ref().unwrap().expose(), "shh");
        assert_eq!(config.scopes, vec!["email"]);
        assert_eq!(config.prompt.as_deref(), Some("login"));
        assert_eq!(
            config.token_store_path,
            Some(PathBuf::from("/tmp/tokens.json"))
        );
        config.validate().unwrap();
    }

    #[test]
    fn debug_output_hides_app_secret() {
        let config = ClientConfig::new("https://tenant.example.com", "app-123")
            .with_app_secret("super-secret-value");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = ClientConfig::new("tenant.example.com", "app-123")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn rejects_empty_app_id() {
        let err = ClientConfig::new("https://tenant.example.com", "  ")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("app_id"));
    }

    #[test]
    fn rejects_empty_secret() {
        let err = ClientConfig::new("https://tenant.example.com", "app-123")
            .with_app_secret("")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("secret"));
    }

    #[test]
    fn rejects_blank_resource() {
        let err = ClientConfig::new("https://tenant.example.com", "app-123")
            .with_resources(vec![String::new()])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("resources"));
    }
}
