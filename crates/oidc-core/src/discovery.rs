//! OpenID Connect discovery
//!
//! The provider publishes its metadata at
//! `{endpoint}/oidc/.well-known/openid-configuration`. Only the fields this
//! client uses are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::constants::{CODE_CHALLENGE_METHOD, DISCOVERY_PATH};
use crate::error::{Error, Result};
use crate::http::{decode_json, ensure_success};

/// Provider metadata from the discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,
}

impl OidcConfig {
    /// Whether the provider accepts S256 challenges. Absent metadata is
    /// treated as supported; the provider rejects the request otherwise.
    pub fn supports_s256(&self) -> bool {
        self.code_challenge_methods_supported
            .as_ref()
            .is_none_or(|methods| methods.iter().any(|m| m == CODE_CHALLENGE_METHOD))
    }
}

/// Build the discovery URL for a tenant endpoint. A trailing `/` on the
/// endpoint is tolerated.
pub fn discovery_url(endpoint: &str) -> Result<Url> {
    let base = endpoint.trim_end_matches('/');
    Url::parse(&format!("{base}{DISCOVERY_PATH}"))
        .map_err(|e| Error::InvalidUri(format!("discovery URL for {endpoint:?}: {e}")))
}

/// Fetch and decode the discovery document.
pub async fn fetch_oidc_config(client: &reqwest::Client, endpoint: &str) -> Result<OidcConfig> {
    let url = discovery_url(endpoint)?;
    debug!(url = %url, "fetching OIDC configuration");

    let response = client
        .get(url.as_str())
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| Error::Http(format!("discovery request failed: {e}")))?;

    let response = ensure_success(response).await?;
    decode_json(response, "OIDC configuration").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn discovery_json(base: &str) -> serde_json::Value {
        serde_json::json!({
            "issuer": format!("{base}/oidc"),
            "authorization_endpoint": format!("{base}/oidc/auth"),
            "token_endpoint": format!("{base}/oidc/token"),
            "end_session_endpoint": format!("{base}/oidc/session/end"),
            "revocation_endpoint": format!("{base}/oidc/token/revocation"),
            "userinfo_endpoint": format!("{base}/oidc/me"),
            "jwks_uri": format!("{base}/oidc/jwks"),
            "response_types_supported": ["code"],
            "code_challenge_methods_supported": ["S256"]
        })
    }

    #[test]
    fn discovery_url_appends_well_known_path() {
        let url = discovery_url("https://tenant.example.com").unwrap();
        assert_eq!(
            url.as_str(),
            "https://tenant.example.com/oidc/.well-known/openid-configuration"
        );
    }

    #[test]
    fn discovery_url_tolerates_trailing_slash() {
        let url = discovery_url("https://tenant.example.com/").unwrap();
        assert_eq!(
            url.as_str(),
            "https://tenant.example.com/oidc/.well-known/openid-configuration"
        );
    }

    #[test]
    fn discovery_url_rejects_garbage() {
        assert!(matches!(
            discovery_url("not a url"),
            Err(Error::InvalidUri(_))
        ));
    }

    #[test]
    fn supports_s256_when_metadata_missing() {
        let mut config: OidcConfig =
            serde_json::from_value(discovery_json("https://t.example.com")).unwrap();
        assert!(config.supports_s256());
        config.code_challenge_methods_supported = None;
        assert!(config.supports_s256());
        config.code_challenge_methods_supported = Some(vec!["plain".into()]);
        assert!(!config.supports_s256());
    }

    #[tokio::test]
    async fn fetch_decodes_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(discovery_json(&server.uri())))
            .mount(&server)
            .await;

        let config = fetch_oidc_config(&reqwest::Client::new(), &server.uri())
            .await
            .unwrap();
        assert_eq!(config.issuer, format!("{}/oidc", server.uri()));
        assert_eq!(config.jwks_uri, format!("{}/oidc/jwks", server.uri()));
        assert!(config.revocation_endpoint.is_some());
    }

    #[tokio::test]
    async fn fetch_reports_missing_document() {
        let server = MockServer::start().await;
        let endpoint = format!("{}/bad", server.uri());

        let err = fetch_oidc_config(&reqwest::Client::new(), &endpoint)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::UnexpectedStatus { status: 404, .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn fetch_reports_unparseable_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = fetch_oidc_config(&reqwest::Client::new(), &server.uri())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got: {err:?}");
    }
}
