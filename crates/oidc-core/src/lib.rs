//! OIDC protocol layer for the identity provider
//!
//! Stateless building blocks for the authorization-code + PKCE flow. Every
//! function takes what it needs as arguments and returns a value; token
//! state and persistence live in `oidc-client`.
//!
//! Sign-in flow:
//! 1. `discovery::fetch_oidc_config()` resolves the provider endpoints
//! 2. `pkce::generate_state()` + `pkce::generate_code_verifier()`
//! 3. `authorization::generate_sign_in_uri()` is presented in a browser
//! 4. `authorization::verify_and_parse_sign_in_callback_uri()` yields the code
//! 5. `token::fetch_token_by_authorization_code()` exchanges it
//! 6. `jwks::fetch_jwk_set()` + `id_token::verify_id_token()` validate the ID token

pub mod authorization;
pub mod constants;
pub mod discovery;
pub mod error;
mod http;
pub mod id_token;
pub mod jwks;
pub mod pkce;
pub mod token;
pub mod user_info;

pub use authorization::{
    SignInUriParams, generate_sign_in_uri, generate_sign_out_uri,
    verify_and_parse_sign_in_callback_uri, with_reserved_scopes,
};
pub use constants::*;
pub use discovery::{OidcConfig, discovery_url, fetch_oidc_config};
pub use error::{CallbackErrorKind, Error, IdTokenErrorKind, Result};
pub use id_token::{IdTokenClaims, decode_id_token_claims, verify_id_token};
pub use jsonwebtoken::jwk::JwkSet;
pub use jwks::fetch_jwk_set;
pub use pkce::{generate_code_challenge, generate_code_verifier, generate_state};
pub use token::{
    AuthorizationCodeGrant, CodeTokenResponse, RefreshTokenGrant, RefreshTokenResponse,
    fetch_token_by_authorization_code, fetch_token_by_refresh_token, revoke,
};
pub use user_info::{UserInfo, fetch_user_info};
