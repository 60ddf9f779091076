//! Token endpoint interactions
//!
//! Three calls against the provider:
//! 1. Authorization code exchange (completes the sign-in flow)
//! 2. Refresh token grant (new access token, optionally for a resource)
//! 3. Token revocation (sign-out)
//!
//! Confidential clients send their secret with HTTP basic auth; public
//! clients send only `client_id`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::http::{decode_json, ensure_success};

/// Result of the authorization code exchange.
///
/// Encoded as camelCase; the token endpoint's snake_case spelling is also
/// accepted on decode. `expires_in` is a delta in seconds from the response
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeTokenResponse {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(alias = "refresh_token", default)]
    pub refresh_token: Option<String>,
    #[serde(alias = "id_token")]
    pub id_token: String,
    #[serde(default)]
    pub scope: String,
    #[serde(alias = "expires_in")]
    pub expires_in: u64,
}

/// Result of a refresh token grant. The provider may rotate the refresh
/// token and may issue a new ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: String,
    pub expires_in: u64,
}

/// Inputs for [`fetch_token_by_authorization_code`].
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationCodeGrant<'a> {
    pub token_endpoint: &'a str,
    pub client_id: &'a str,
    pub app_secret: Option<&'a str>,
    pub redirect_uri: &'a str,
    pub code_verifier: &'a str,
    pub code: &'a str,
    pub resource: Option<&'a str>,
}

/// Inputs for [`fetch_token_by_refresh_token`].
#[derive(Debug, Clone, Copy)]
pub struct RefreshTokenGrant<'a> {
    pub token_endpoint: &'a str,
    pub client_id: &'a str,
    pub app_secret: Option<&'a str>,
    pub refresh_token: &'a str,
    pub resource: Option<&'a str>,
    pub scopes: &'a [String],
}

fn token_request(
    client: &reqwest::Client,
    endpoint: &str,
    client_id: &str,
    app_secret: Option<&str>,
) -> reqwest::RequestBuilder {
    let request = client.post(endpoint);
    match app_secret {
        Some(secret) => request.basic_auth(client_id, Some(secret)),
        None => request,
    }
}

/// Exchange an authorization code (plus the PKCE verifier that proves we
/// started the flow) for tokens.
pub async fn fetch_token_by_authorization_code(
    client: &reqwest::Client,
    grant: &AuthorizationCodeGrant<'_>,
) -> Result<CodeTokenResponse> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", grant.code),
        ("code_verifier", grant.code_verifier),
        ("client_id", grant.client_id),
        ("redirect_uri", grant.redirect_uri),
    ];
    if let Some(resource) = grant.resource {
        form.push(("resource", resource));
    }

    debug!(endpoint = grant.token_endpoint, "exchanging authorization code");
    let response = token_request(
        client,
        grant.token_endpoint,
        grant.client_id,
        grant.app_secret,
    )
    .form(&form)
    .send()
    .await
    .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let response = ensure_success(response).await?;
    decode_json(response, "token response").await
}

/// Trade a refresh token for a new access token, optionally scoped to an
/// API resource.
pub async fn fetch_token_by_refresh_token(
    client: &reqwest::Client,
    grant: &RefreshTokenGrant<'_>,
) -> Result<RefreshTokenResponse> {
    let scope = grant.scopes.join(" ");
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", grant.refresh_token),
        ("client_id", grant.client_id),
    ];
    if let Some(resource) = grant.resource {
        form.push(("resource", resource));
    }
    if !scope.is_empty() {
        form.push(("scope", scope.as_str()));
    }

    debug!(
        endpoint = grant.token_endpoint,
        resource = grant.resource.unwrap_or(""),
        "refreshing access token"
    );
    let response = token_request(
        client,
        grant.token_endpoint,
        grant.client_id,
        grant.app_secret,
    )
    .form(&form)
    .send()
    .await
    .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let response = ensure_success(response).await?;
    decode_json(response, "refresh response").await
}

/// Revoke a token (RFC 7009). The provider answers 200 even for unknown
/// tokens, so any non-2xx is a real failure.
pub async fn revoke(
    client: &reqwest::Client,
    revocation_endpoint: &str,
    client_id: &str,
    app_secret: Option<&str>,
    token: &str,
) -> Result<()> {
    let response = token_request(client, revocation_endpoint, client_id, app_secret)
        .form(&[("token", token), ("client_id", client_id)])
        .send()
        .await
        .map_err(|e| Error::Http(format!("revocation request failed: {e}")))?;

    ensure_success(response).await?;
    debug!(endpoint = revocation_endpoint, "token revoked");
    Ok(())
}
