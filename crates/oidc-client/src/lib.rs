//! Stateful OIDC client
//!
//! Wraps the `oidc-core` protocol functions with token state:
//! - `Client` owns the ID token, refresh token and access-token cache
//! - `AuthSession` is the interactive step of sign-in, injected by the host
//! - `TokenStore` persists tokens between runs
//!
//! Every failure is an [`Error`] whose variant names the failing stage.

mod access_token;
mod client;
mod config;
mod error;
mod metrics;
mod session;
mod store;
mod verifier;

pub use access_token::{AccessToken, access_token_key, unix_now};
pub use client::Client;
pub use config::ClientConfig;
pub use error::{
    AccessTokenError, AccessTokenErrorKind, Error, IdTokenError, JwkSetError, JwkSetErrorKind,
    OidcConfigError, OidcConfigErrorKind, Result, SignInError, SignInErrorKind, SignOutError,
    SignOutErrorKind, UserInfoError, UserInfoErrorKind,
};
pub use oidc_core::{
    CodeTokenResponse, IdTokenClaims, IdTokenErrorKind, JwkSet, OidcConfig, UserInfo,
};
pub use session::{AuthSession, AuthSessionContext, Browser, BrowserAuthSession, BrowserError};
pub use store::{StoredTokens, TokenStore};
pub use verifier::{IdTokenVerifier, JwksIdTokenVerifier};
