//! Stateful OIDC client
//!
//! Holds the ID token, refresh token and access-token cache for one app and
//! drives the operations that change them. Token state is only written after
//! every step of an operation has succeeded, in a single lock scope, so a
//! failed sign-in or refresh leaves the previous tokens untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use common::Secret;
use oidc_core::{
    IdTokenClaims, JwkSet, OidcConfig, RefreshTokenGrant, UserInfo, decode_id_token_claims,
    fetch_token_by_refresh_token, generate_sign_out_uri, revoke, with_reserved_scopes,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::access_token::{AccessToken, access_token_key, unix_now};
use crate::config::ClientConfig;
use crate::error::{
    AccessTokenErrorKind, Error, JwkSetErrorKind, OidcConfigErrorKind, Result, SignInError,
    SignInErrorKind, SignOutErrorKind, UserInfoErrorKind,
};
use crate::metrics;
use crate::session::{AuthSession, AuthSessionContext};
use crate::store::{StoredTokens, TokenStore};
use crate::verifier::{IdTokenVerifier, JwksIdTokenVerifier};

pub struct Client {
    config: ClientConfig,
    http: reqwest::Client,
    oidc_config: RwLock<Option<OidcConfig>>,
    tokens: RwLock<StoredTokens>,
    store: Option<TokenStore>,
    verifier: Arc<dyn IdTokenVerifier>,
}

impl Client {
    /// Build a client. When a token store path is configured the store is
    /// loaded (or created) and any tokens saved for this app are restored.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let store = match &config.token_store_path {
            Some(path) => Some(TokenStore::load(path.clone()).await?),
            None => None,
        };

        let tokens = match &store {
            Some(store) => store.get(&config.app_id).await.unwrap_or_default(),
            None => StoredTokens::default(),
        };
        if let Some(store) = &store
            && tokens.id_token.is_some()
        {
            info!(
                app_id = %config.app_id,
                path = %store.path().display(),
                "restored saved session"
            );
        }

        Ok(Self {
            config,
            http: reqwest::Client::new(),
            oidc_config: RwLock::new(None),
            tokens: RwLock::new(tokens),
            store,
            verifier: Arc::new(JwksIdTokenVerifier),
        })
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn with_id_token_verifier(mut self, verifier: Arc<dyn IdTokenVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn id_token(&self) -> Option<String> {
        self.tokens.read().await.id_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .refresh_token
            .as_ref()
            .map(|t| t.expose().clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.id_token.is_some()
    }

    /// Claims of the held ID token, decoded without re-verifying (it was
    /// verified before it was committed). `None` when signed out.
    pub async fn id_token_claims(&self) -> Result<Option<IdTokenClaims>> {
        let tokens = self.tokens.read().await;
        tokens
            .id_token
            .as_deref()
            .map(decode_id_token_claims)
            .transpose()
            .map_err(Error::from_id_token)
    }

    /// Discovery document for the configured endpoint. Fetched once, then
    /// served from memory.
    pub async fn fetch_oidc_config(&self) -> Result<OidcConfig> {
        if let Some(config) = self.oidc_config.read().await.as_ref() {
            return Ok(config.clone());
        }

        let config = oidc_core::fetch_oidc_config(&self.http, &self.config.endpoint)
            .await
            .map_err(|e| {
                warn!(
                    endpoint = %self.config.endpoint,
                    error = %e,
                    "failed to fetch OIDC configuration"
                );
                Error::oidc_config(OidcConfigErrorKind::UnableToFetchOidcConfig, e.to_string())
            })?;

        *self.oidc_config.write().await = Some(config.clone());
        Ok(config)
    }

    pub async fn fetch_jwk_set(&self, jwks_uri: &str) -> Result<JwkSet> {
        oidc_core::fetch_jwk_set(&self.http, jwks_uri)
            .await
            .map_err(|e| {
                warn!(jwks_uri, error = %e, "failed to fetch JWK set");
                match e {
                    oidc_core::Error::Parse(message) => {
                        Error::jwk_set(JwkSetErrorKind::UnableToParseJwkSet, message)
                    }
                    other => {
                        Error::jwk_set(JwkSetErrorKind::UnableToFetchJwkSet, other.to_string())
                    }
                }
            })
    }

    /// Interactive sign-in.
    ///
    /// Steps, each of which aborts with its own error stage:
    /// 1. Parse `redirect_uri` (no network before this succeeds)
    /// 2. Fetch discovery
    /// 3. Run `session` (its sign-in errors pass through unchanged)
    /// 4. Fetch the JWK set and verify the returned ID token
    /// 5. Commit access, refresh and ID tokens together, then persist
    pub async fn sign_in_with_browser(
        &self,
        session: &dyn AuthSession,
        redirect_uri: &str,
        extra_params: Option<HashMap<String, String>>,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.sign_in(session, redirect_uri, extra_params).await;

        let outcome = metrics::outcome(&result);
        metrics::record_sign_in(outcome, started.elapsed().as_secs_f64());
        match &result {
            Ok(()) => info!(app_id = %self.config.app_id, "signed in"),
            Err(e) => warn!(
                app_id = %self.config.app_id,
                stage = outcome,
                error = %e,
                "sign-in failed"
            ),
        }
        result
    }

    async fn sign_in(
        &self,
        session: &dyn AuthSession,
        redirect_uri: &str,
        extra_params: Option<HashMap<String, String>>,
    ) -> Result<()> {
        let redirect_uri = parse_redirect_uri(redirect_uri)?;
        let oidc_config = self.fetch_oidc_config().await?;

        let context = AuthSessionContext {
            http: self.http.clone(),
            app_id: self.config.app_id.clone(),
            app_secret: self.config.app_secret.clone(),
            redirect_uri,
            scopes: with_reserved_scopes(&self.config.scopes),
            resources: self.config.resources.clone(),
            prompt: self.config.prompt.clone(),
            extra_params,
            oidc_config,
        };

        let response = session.start(&context).await?;
        debug!("auth session returned tokens");

        let oidc_config = context.oidc_config;
        let jwks = self.fetch_jwk_set(&oidc_config.jwks_uri).await?;
        self.verifier
            .verify(
                &response.id_token,
                &self.config.app_id,
                &oidc_config.issuer,
                &jwks,
            )
            .map_err(Error::from_id_token)?;

        let now = unix_now();
        let snapshot = {
            let mut tokens = self.tokens.write().await;
            tokens.id_token = Some(response.id_token);
            tokens.refresh_token = response.refresh_token.map(Secret::new);
            tokens.access_tokens.clear();
            tokens.access_tokens.insert(
                access_token_key(None, &[]),
                AccessToken::new(
                    response.access_token,
                    response.scope,
                    response.expires_in,
                    now,
                ),
            );
            tokens.clone()
        };

        self.persist(snapshot).await
    }

    /// Access token for `resource` (`None` for the default token issued at
    /// sign-in). Served from cache while unexpired, otherwise obtained with
    /// the refresh token; a rotated refresh token or new ID token from that
    /// grant is committed along with the access token.
    pub async fn get_access_token(&self, resource: Option<&str>) -> Result<String> {
        let key = access_token_key(resource, &[]);
        let refresh_token = {
            let tokens = self.tokens.read().await;
            if let Some(cached) = tokens.access_tokens.get(&key)
                && !cached.is_expired(unix_now())
            {
                return Ok(cached.token.expose().clone());
            }
            tokens.refresh_token.clone().ok_or_else(|| {
                Error::access_token(
                    AccessTokenErrorKind::NoRefreshTokenFound,
                    "not signed in or refresh token was not granted",
                )
            })?
        };

        let result = self.refresh(&key, resource, &refresh_token).await;
        metrics::record_token_refresh(metrics::outcome(&result));
        result
    }

    async fn refresh(
        &self,
        key: &str,
        resource: Option<&str>,
        refresh_token: &Secret<String>,
    ) -> Result<String> {
        let oidc_config = self.fetch_oidc_config().await?;
        let app_secret = self.config.app_secret.as_ref().map(|s| s.expose().as_str());

        let response = fetch_token_by_refresh_token(
            &self.http,
            &RefreshTokenGrant {
                token_endpoint: &oidc_config.token_endpoint,
                client_id: &self.config.app_id,
                app_secret,
                refresh_token: refresh_token.expose(),
                resource,
                scopes: &[],
            },
        )
        .await
        .map_err(|e| {
            warn!(resource = resource.unwrap_or(""), error = %e, "token refresh failed");
            Error::access_token(
                AccessTokenErrorKind::UnableToFetchTokenByRefreshToken,
                e.to_string(),
            )
        })?;

        if let Some(id_token) = &response.id_token {
            let jwks = self.fetch_jwk_set(&oidc_config.jwks_uri).await?;
            self.verifier
                .verify(id_token, &self.config.app_id, &oidc_config.issuer, &jwks)
                .map_err(Error::from_id_token)?;
        }

        let access_token = response.access_token.clone();
        let now = unix_now();
        let snapshot = {
            let mut tokens = self.tokens.write().await;
            tokens.access_tokens.insert(
                key.to_string(),
                AccessToken::new(
                    response.access_token,
                    response.scope,
                    response.expires_in,
                    now,
                ),
            );
            if let Some(rotated) = response.refresh_token {
                tokens.refresh_token = Some(Secret::new(rotated));
            }
            if let Some(id_token) = response.id_token {
                tokens.id_token = Some(id_token);
            }
            tokens.clone()
        };
        debug!(key, "access token refreshed");

        self.persist(snapshot).await?;
        Ok(access_token)
    }

    /// Profile of the signed-in user from the userinfo endpoint.
    pub async fn fetch_user_info(&self) -> Result<UserInfo> {
        let access_token = self.get_access_token(None).await?;
        let oidc_config = self.fetch_oidc_config().await?;
        let endpoint = oidc_config.userinfo_endpoint.as_deref().ok_or_else(|| {
            Error::user_info(
                UserInfoErrorKind::EndpointNotAvailable,
                "provider does not advertise a userinfo endpoint",
            )
        })?;

        oidc_core::fetch_user_info(&self.http, endpoint, &access_token)
            .await
            .map_err(|e| Error::user_info(UserInfoErrorKind::UnableToFetchUserInfo, e.to_string()))
    }

    /// Forget all tokens locally, then revoke the refresh token at the
    /// provider. Local state is cleared even when revocation fails.
    ///
    /// Returns the end-session URL to present to the user, when the
    /// provider advertises one.
    pub async fn sign_out(&self, post_logout_redirect_uri: Option<&str>) -> Result<Option<Url>> {
        let refresh_token = {
            let mut tokens = self.tokens.write().await;
            std::mem::take(&mut *tokens).refresh_token
        };
        if let Some(store) = &self.store {
            store.remove(&self.config.app_id).await?;
        }
        info!(app_id = %self.config.app_id, "local session cleared");

        // Without discovery a held refresh token cannot be revoked.
        let oidc_config = match self.fetch_oidc_config().await {
            Ok(config) => config,
            Err(e) if refresh_token.is_some() => {
                warn!(error = %e, "refresh token not revoked");
                return Err(Error::sign_out(
                    SignOutErrorKind::UnableToRevokeToken,
                    e.to_string(),
                ));
            }
            Err(e) => return Err(e),
        };

        if let (Some(token), Some(endpoint)) =
            (refresh_token, oidc_config.revocation_endpoint.as_deref())
        {
            let app_secret = self.config.app_secret.as_ref().map(|s| s.expose().as_str());
            revoke(
                &self.http,
                endpoint,
                &self.config.app_id,
                app_secret,
                token.expose(),
            )
            .await
            .map_err(|e| {
                warn!(error = %e, "refresh token revocation failed");
                Error::sign_out(SignOutErrorKind::UnableToRevokeToken, e.to_string())
            })?;
        }

        oidc_config
            .end_session_endpoint
            .as_deref()
            .map(|endpoint| {
                generate_sign_out_uri(endpoint, &self.config.app_id, post_logout_redirect_uri)
            })
            .transpose()
            .map_err(|e| {
                Error::sign_out(SignOutErrorKind::UnableToConstructSignOutUri, e.to_string())
            })
    }

    async fn persist(&self, tokens: StoredTokens) -> Result<()> {
        match &self.store {
            Some(store) => store.save(&self.config.app_id, tokens).await,
            None => Ok(()),
        }
    }
}

fn parse_redirect_uri(redirect_uri: &str) -> Result<Url> {
    if redirect_uri.trim().is_empty() {
        return Err(SignInError::new(
            SignInErrorKind::UnableToConstructRedirectUri,
            "redirect URI is empty",
        )
        .into());
    }
    Url::parse(redirect_uri).map_err(|e| {
        SignInError::new(
            SignInErrorKind::UnableToConstructRedirectUri,
            format!("{redirect_uri:?}: {e}"),
        )
        .into()
    })
}
