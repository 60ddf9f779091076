//! Error types for protocol-level OIDC operations

/// Why a sign-in callback URI was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackErrorKind {
    /// Callback does not start with the registered redirect URI
    UriMismatch,
    /// Provider redirected back with an `error` parameter
    ErrorFound,
    MissingState,
    StateMismatch,
    MissingCode,
}

/// Why an ID token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdTokenErrorKind {
    /// Not a decodable JWT (header or payload)
    Malformed,
    /// No JWK matches the token's `kid` / algorithm
    KeyNotFound,
    InvalidSignature,
    IssuerMismatch,
    AudienceMismatch,
    Expired,
    /// `iat` further than the allowed leeway from the local clock
    IssuedAtOutOfRange,
}

/// Errors from OIDC protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("OAuth error {error}: {}", description.as_deref().unwrap_or("<no description>"))]
    OAuth {
        error: String,
        description: Option<String>,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("sign-in callback rejected ({kind:?}): {message}")]
    Callback {
        kind: CallbackErrorKind,
        message: String,
    },

    #[error("ID token rejected ({kind:?}): {message}")]
    IdToken {
        kind: IdTokenErrorKind,
        message: String,
    },
}

impl Error {
    pub(crate) fn callback(kind: CallbackErrorKind, message: impl Into<String>) -> Self {
        Self::Callback {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn id_token(kind: IdTokenErrorKind, message: impl Into<String>) -> Self {
        Self::IdToken {
            kind,
            message: message.into(),
        }
    }
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oauth_error_display_includes_description() {
        let err = Error::OAuth {
            error: "invalid_grant".into(),
            description: Some("grant request is invalid".into()),
        };
        assert_eq!(
            err.to_string(),
            "OAuth error invalid_grant: grant request is invalid"
        );
    }

    #[test]
    fn oauth_error_display_without_description() {
        let err = Error::OAuth {
            error: "invalid_client".into(),
            description: None,
        };
        assert!(err.to_string().contains("<no description>"));
    }

    #[test]
    fn callback_error_carries_kind() {
        let err = Error::callback(CallbackErrorKind::StateMismatch, "state differs");
        assert!(matches!(
            err,
            Error::Callback {
                kind: CallbackErrorKind::StateMismatch,
                ..
            }
        ));
        assert!(err.to_string().contains("StateMismatch"));
    }
}
