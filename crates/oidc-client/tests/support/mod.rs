//! Shared fixtures: a wiremock provider, signed ID tokens and scripted
//! auth sessions.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use oidc_client::{
    AccessToken, AuthSession, AuthSessionContext, Client, ClientConfig, CodeTokenResponse,
    IdTokenVerifier, JwkSet, SignInError, SignInErrorKind, StoredTokens, TokenStore, unix_now,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const APP_ID: &str = "app-123";
pub const REDIRECT_URI: &str = "io.logto.dev://callback";
pub const INITIAL_ID_TOKEN: &str = "initial-id-token";
pub const INITIAL_REFRESH_TOKEN: &str = "initial-refresh-token";
pub const SIGNING_SECRET: &[u8] = b"oidc-client-test-signing-secret!";
pub const DISCOVERY_PATH: &str = "/oidc/.well-known/openid-configuration";

pub fn discovery_json(base: &str) -> serde_json::Value {
    serde_json::json!({
        "issuer": format!("{base}/oidc"),
        "authorization_endpoint": format!("{base}/oidc/auth"),
        "token_endpoint": format!("{base}/oidc/token"),
        "end_session_endpoint": format!("{base}/oidc/session/end"),
        "revocation_endpoint": format!("{base}/oidc/token/revocation"),
        "userinfo_endpoint": format!("{base}/oidc/me"),
        "jwks_uri": format!("{base}/oidc/jwks"),
        "code_challenge_methods_supported": ["S256"]
    })
}

/// Mock provider serving discovery only. JWKS, token and userinfo
/// endpoints are mounted per test.
pub async fn provider() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_json(&server.uri())))
        .mount(&server)
        .await;
    server
}

pub fn issuer(server: &MockServer) -> String {
    format!("{}/oidc", server.uri())
}

pub fn jwks_json() -> serde_json::Value {
    serde_json::json!({
        "keys": [{
            "kty": "oct",
            "kid": "k1",
            "alg": "HS256",
            "use": "sig",
            "k": URL_SAFE_NO_PAD.encode(SIGNING_SECRET)
        }]
    })
}

pub async fn mount_jwks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oidc/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
        .mount(server)
        .await;
}

/// HS256 ID token for `aud`, issued now by the mock provider.
pub fn signed_id_token(server: &MockServer, aud: &str, sub: &str) -> String {
    let now = unix_now() as i64;
    let claims = serde_json::json!({
        "iss": issuer(server),
        "sub": sub,
        "aud": aud,
        "iat": now,
        "exp": now + 3600,
        "username": "ada"
    });
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("k1".into());
    jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(SIGNING_SECRET)).unwrap()
}

/// Verifier that accepts any token.
pub struct AcceptAll;

impl IdTokenVerifier for AcceptAll {
    fn verify(&self, _: &str, _: &str, _: &str, _: &JwkSet) -> oidc_core::Result<()> {
        Ok(())
    }
}

pub fn code_token_response(access: &str, refresh: &str, id: &str) -> CodeTokenResponse {
    CodeTokenResponse {
        access_token: access.into(),
        refresh_token: Some(refresh.into()),
        id_token: id.into(),
        scope: "openid offline_access profile".into(),
        expires_in: 300,
    }
}

/// Tokens of an already signed-in user. The default access token expires at
/// `access_expires_at`.
pub fn signed_in_tokens(access_expires_at: u64) -> StoredTokens {
    let mut access_tokens = HashMap::new();
    access_tokens.insert(
        "@".to_string(),
        AccessToken {
            token: "initial-access-token".to_string().into(),
            scope: "openid".into(),
            expires_at: access_expires_at,
        },
    );
    StoredTokens {
        id_token: Some(INITIAL_ID_TOKEN.into()),
        refresh_token: Some(INITIAL_REFRESH_TOKEN.to_string().into()),
        access_tokens,
    }
}

pub async fn seed_store(path: &Path, tokens: StoredTokens) {
    let store = TokenStore::load(path.to_path_buf()).await.unwrap();
    store.save(APP_ID, tokens).await.unwrap();
}

pub async fn stored_tokens(path: &Path) -> Option<StoredTokens> {
    TokenStore::load(path.to_path_buf())
        .await
        .unwrap()
        .get(APP_ID)
        .await
}

pub async fn client(endpoint: &str, store_path: &Path) -> Client {
    Client::new(ClientConfig::new(endpoint, APP_ID).with_token_store(store_path))
        .await
        .unwrap()
}

/// Session that records what it was given and replies with a fixed
/// outcome.
pub struct ScriptedSession {
    outcome: Result<CodeTokenResponse, (SignInErrorKind, String)>,
    calls: AtomicUsize,
    seen: Mutex<Option<AuthSessionContext>>,
}

impl ScriptedSession {
    pub fn succeeding(response: CodeTokenResponse) -> Self {
        Self {
            outcome: Ok(response),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        }
    }

    pub fn failing(kind: SignInErrorKind, message: &str) -> Self {
        Self {
            outcome: Err((kind, message.to_string())),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_context(&self) -> Option<AuthSessionContext> {
        self.seen.lock().unwrap().clone()
    }
}

impl AuthSession for ScriptedSession {
    fn start<'a>(
        &'a self,
        context: &'a AuthSessionContext,
    ) -> Pin<Box<dyn Future<Output = Result<CodeTokenResponse, SignInError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = Some(context.clone());
            match &self.outcome {
                Ok(response) => Ok(response.clone()),
                Err((kind, message)) => Err(SignInError::new(*kind, message.clone())),
            }
        })
    }
}
