//! Interactive sign-in strategy
//!
//! [`AuthSession`] is the seam between the client and whatever drives the
//! user through the provider's authorization page. The client resolves
//! discovery and the redirect URI, hands an [`AuthSessionContext`] to the
//! session, and only validates and commits what comes back. Tests inject
//! scripted sessions; applications use [`BrowserAuthSession`] with a
//! [`Browser`] that opens the URL and captures the redirect.
//!
//! Uses `Pin<Box<dyn Future>>` return types so sessions can be passed as
//! `&dyn AuthSession`.

use std::collections::HashMap;
use std::pin::Pin;

use common::Secret;
use oidc_core::{
    AuthorizationCodeGrant, CodeTokenResponse, OidcConfig, SignInUriParams,
    fetch_token_by_authorization_code, generate_code_challenge, generate_code_verifier,
    generate_sign_in_uri, generate_state, verify_and_parse_sign_in_callback_uri,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SignInError, SignInErrorKind};

/// Everything a session needs to run one authorization-code flow.
#[derive(Debug, Clone)]
pub struct AuthSessionContext {
    pub http: reqwest::Client,
    pub oidc_config: OidcConfig,
    pub app_id: String,
    pub app_secret: Option<Secret<String>>,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    pub resources: Vec<String>,
    pub prompt: Option<String>,
    /// Appended verbatim to the authorization request
    pub extra_params: Option<HashMap<String, String>>,
}

pub trait AuthSession: Send + Sync {
    /// Run the flow and return the token endpoint's response. Failures are
    /// reported as typed sign-in errors and passed through by the client
    /// unchanged.
    fn start<'a>(
        &'a self,
        context: &'a AuthSessionContext,
    ) -> Pin<Box<dyn Future<Output = Result<CodeTokenResponse, SignInError>> + Send + 'a>>;
}

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("sign-in was cancelled by the user")]
    Cancelled,

    #[error("browser session failed: {0}")]
    Failed(String),
}

/// Presents an authorization URL to the user and returns the URL the
/// provider redirected to.
pub trait Browser: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        auth_uri: &'a Url,
        redirect_uri: &'a Url,
    ) -> Pin<Box<dyn Future<Output = Result<Url, BrowserError>> + Send + 'a>>;
}

/// Default session: PKCE + state, a [`Browser`] round trip, then the code
/// exchange.
pub struct BrowserAuthSession<B> {
    browser: B,
}

impl<B: Browser> BrowserAuthSession<B> {
    pub fn new(browser: B) -> Self {
        Self { browser }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    async fn run(&self, context: &AuthSessionContext) -> Result<CodeTokenResponse, SignInError> {
        if !context.oidc_config.supports_s256() {
            return Err(SignInError::new(
                SignInErrorKind::UnableToConstructAuthUri,
                "provider does not support S256 code challenges",
            ));
        }

        let state = generate_state();
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);

        let auth_uri = generate_sign_in_uri(&SignInUriParams {
            authorization_endpoint: &context.oidc_config.authorization_endpoint,
            client_id: &context.app_id,
            redirect_uri: &context.redirect_uri,
            code_challenge: &code_challenge,
            state: &state,
            scopes: &context.scopes,
            resources: &context.resources,
            prompt: context.prompt.as_deref(),
            extra_params: context.extra_params.as_ref(),
        })
        .map_err(|e| SignInError::new(SignInErrorKind::UnableToConstructAuthUri, e.to_string()))?;

        info!(redirect_uri = %context.redirect_uri, "presenting authorization page");
        let callback = self
            .browser
            .authenticate(&auth_uri, &context.redirect_uri)
            .await
            .map_err(|e| {
                warn!(error = %e, "browser session ended without a callback");
                match e {
                    BrowserError::Cancelled => {
                        SignInError::new(SignInErrorKind::AuthFailed, e.to_string())
                    }
                    BrowserError::Failed(_) => {
                        SignInError::new(SignInErrorKind::UnknownError, e.to_string())
                    }
                }
            })?;

        let code = verify_and_parse_sign_in_callback_uri(&callback, &context.redirect_uri, &state)
            .map_err(|e| {
                SignInError::new(SignInErrorKind::UnexpectedSignInCallback, e.to_string())
            })?;
        debug!("authorization code received");

        let app_secret = context.app_secret.as_ref().map(|s| s.expose().as_str());
        fetch_token_by_authorization_code(
            &context.http,
            &AuthorizationCodeGrant {
                token_endpoint: &context.oidc_config.token_endpoint,
                client_id: &context.app_id,
                app_secret,
                redirect_uri: context.redirect_uri.as_str(),
                code_verifier: &code_verifier,
                code: &code,
                resource: None,
            },
        )
        .await
        .map_err(|e| SignInError::new(SignInErrorKind::UnableToFetchToken, e.to_string()))
    }
}

impl<B: Browser> AuthSession for BrowserAuthSession<B> {
    fn start<'a>(
        &'a self,
        context: &'a AuthSessionContext,
    ) -> Pin<Box<dyn Future<Output = Result<CodeTokenResponse, SignInError>> + Send + 'a>> {
        Box::pin(self.run(context))
    }
}
