//! Stage-typed errors for client operations
//!
//! Each variant of [`Error`] names the step that failed and carries a `kind`
//! that callers match on: configuration problems (`SignIn` /
//! `UnableToConstructRedirectUri`) read differently from network problems
//! (`OidcConfig`, `JwkSet`) and from flow failures (`SignIn` / `UnknownError`).

use oidc_core::IdTokenErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInErrorKind {
    /// Redirect URI is empty or not a URI; raised before any network call
    UnableToConstructRedirectUri,
    UnableToConstructAuthUri,
    /// User cancelled or the browser reported an authentication failure
    AuthFailed,
    UnexpectedSignInCallback,
    UnableToFetchToken,
    UnknownError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidcConfigErrorKind {
    UnableToFetchOidcConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwkSetErrorKind {
    UnableToFetchJwkSet,
    UnableToParseJwkSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTokenErrorKind {
    NoRefreshTokenFound,
    UnableToFetchTokenByRefreshToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInfoErrorKind {
    /// Discovery document has no `userinfo_endpoint`
    EndpointNotAvailable,
    UnableToFetchUserInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutErrorKind {
    UnableToRevokeToken,
    UnableToConstructSignOutUri,
}

#[derive(Debug, thiserror::Error)]
#[error("sign-in failed ({kind:?}): {message}")]
pub struct SignInError {
    pub kind: SignInErrorKind,
    pub message: String,
}

impl SignInError {
    pub fn new(kind: SignInErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("OIDC configuration error ({kind:?}): {message}")]
pub struct OidcConfigError {
    pub kind: OidcConfigErrorKind,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("JWK set error ({kind:?}): {message}")]
pub struct JwkSetError {
    pub kind: JwkSetErrorKind,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("ID token error ({kind:?}): {message}")]
pub struct IdTokenError {
    pub kind: IdTokenErrorKind,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("access token error ({kind:?}): {message}")]
pub struct AccessTokenError {
    pub kind: AccessTokenErrorKind,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("userinfo error ({kind:?}): {message}")]
pub struct UserInfoError {
    pub kind: UserInfoErrorKind,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("sign-out error ({kind:?}): {message}")]
pub struct SignOutError {
    pub kind: SignOutErrorKind,
    pub message: String,
}

/// Errors from client operations, one variant per failing stage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    SignIn(#[from] SignInError),

    #[error(transparent)]
    OidcConfig(#[from] OidcConfigError),

    #[error(transparent)]
    JwkSet(#[from] JwkSetError),

    #[error(transparent)]
    IdToken(#[from] IdTokenError),

    #[error(transparent)]
    AccessToken(#[from] AccessTokenError),

    #[error(transparent)]
    UserInfo(#[from] UserInfoError),

    #[error(transparent)]
    SignOut(#[from] SignOutError),

    #[error("token storage error: {0}")]
    Storage(String),
}

impl Error {
    pub(crate) fn oidc_config(kind: OidcConfigErrorKind, message: impl Into<String>) -> Self {
        Self::OidcConfig(OidcConfigError {
            kind,
            message: message.into(),
        })
    }

    pub(crate) fn jwk_set(kind: JwkSetErrorKind, message: impl Into<String>) -> Self {
        Self::JwkSet(JwkSetError {
            kind,
            message: message.into(),
        })
    }

    pub(crate) fn access_token(kind: AccessTokenErrorKind, message: impl Into<String>) -> Self {
        Self::AccessToken(AccessTokenError {
            kind,
            message: message.into(),
        })
    }

    pub(crate) fn user_info(kind: UserInfoErrorKind, message: impl Into<String>) -> Self {
        Self::UserInfo(UserInfoError {
            kind,
            message: message.into(),
        })
    }

    pub(crate) fn sign_out(kind: SignOutErrorKind, message: impl Into<String>) -> Self {
        Self::SignOut(SignOutError {
            kind,
            message: message.into(),
        })
    }

    /// Map a verification failure from `oidc-core` to the `IdToken` stage.
    pub(crate) fn from_id_token(err: oidc_core::Error) -> Self {
        match err {
            oidc_core::Error::IdToken { kind, message } => {
                Self::IdToken(IdTokenError { kind, message })
            }
            other => Self::IdToken(IdTokenError {
                kind: IdTokenErrorKind::Malformed,
                message: other.to_string(),
            }),
        }
    }

    /// Short stage label for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::SignIn(_) => "sign_in",
            Error::OidcConfig(_) => "oidc_config",
            Error::JwkSet(_) => "jwk_set",
            Error::IdToken(_) => "id_token",
            Error::AccessToken(_) => "access_token",
            Error::UserInfo(_) => "user_info",
            Error::SignOut(_) => "sign_out",
            Error::Storage(_) => "storage",
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
