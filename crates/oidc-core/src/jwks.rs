//! JSON Web Key Set retrieval
//!
//! Fetches the provider's signing keys from the `jwks_uri` advertised in
//! discovery. Decoding of individual keys is left to `jsonwebtoken`.

use jsonwebtoken::jwk::JwkSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::http::{decode_json, ensure_success};

/// GET the JWK set. Transport and status failures come back as `Http` /
/// `UnexpectedStatus` / `OAuth`; a body that is not a JWK set as `Parse`.
pub async fn fetch_jwk_set(client: &reqwest::Client, jwks_uri: &str) -> Result<JwkSet> {
    debug!(jwks_uri, "fetching JWK set");

    let response = client
        .get(jwks_uri)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| {
            warn!(jwks_uri, error = %e, "JWK set request failed");
            Error::Http(format!("JWK set request failed: {e}"))
        })?;

    let response = ensure_success(response).await?;
    let jwks: JwkSet = decode_json(response, "JWK set").await?;
    debug!(jwks_uri, keys = jwks.keys.len(), "fetched JWK set");
    Ok(jwks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_decodes_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oidc/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [
                    {"kty": "oct", "kid": "k1", "alg": "HS256", "k": "c2VjcmV0LWtleS1tYXRlcmlhbA"}
                ]
            })))
            .mount(&server)
            .await;

        let uri = format!("{}/oidc/jwks", server.uri());
        let jwks = fetch_jwk_set(&reqwest::Client::new(), &uri).await.unwrap();
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].common.key_id.as_deref(), Some("k1"));
    }

    #[tokio::test]
    async fn missing_endpoint_is_a_status_error() {
        let server = MockServer::start().await;
        let uri = format!("{}/oidc/jwks", server.uri());
        let err = fetch_jwk_set(&reqwest::Client::new(), &uri)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_http_error() {
        // Port 9 (discard) on loopback refuses connections
        let err = fetch_jwk_set(&reqwest::Client::new(), "http://127.0.0.1:9/oidc/jwks")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn non_jwks_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oidc/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "not": "a key set"
            })))
            .mount(&server)
            .await;

        let uri = format!("{}/oidc/jwks", server.uri());
        let err = fetch_jwk_set(&reqwest::Client::new(), &uri)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got: {err:?}");
    }
}
