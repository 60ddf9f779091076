//! Protocol constants for the identity provider's OIDC endpoints
//!
//! These are public protocol values, not secrets. Client-specific values
//! (app id, app secret, scopes) come from the caller's configuration.

/// Discovery document path, appended to the tenant endpoint.
pub const DISCOVERY_PATH: &str = "/oidc/.well-known/openid-configuration";

/// Scopes always requested on sign-in. `offline_access` is what makes the
/// provider issue a refresh token.
pub const RESERVED_SCOPES: [&str; 3] = ["openid", "offline_access", "profile"];

/// Default `prompt` value for the authorization request.
pub const DEFAULT_PROMPT: &str = "consent";

/// The only PKCE method this client sends.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Authorization request parameters owned by the protocol. Extra params
/// supplied by the host never replace or duplicate these; scopes, resources
/// and prompt go through their own fields.
pub const RESERVED_AUTH_PARAMS: [&str; 9] = [
    "client_id",
    "redirect_uri",
    "code_challenge",
    "code_challenge_method",
    "state",
    "response_type",
    "scope",
    "prompt",
    "resource",
];

/// Allowed distance between an ID token's `iat` and the local clock, seconds.
pub const ISSUED_AT_LEEWAY_SECS: u64 = 60;
