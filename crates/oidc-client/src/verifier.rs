//! ID token verification seam

use oidc_core::{JwkSet, verify_id_token};

use crate::access_token::unix_now;

/// Checks an ID token against the provider's keys before the client
/// commits it.
pub trait IdTokenVerifier: Send + Sync {
    fn verify(
        &self,
        id_token: &str,
        client_id: &str,
        issuer: &str,
        jwks: &JwkSet,
    ) -> oidc_core::Result<()>;
}

/// Signature and claim verification against the wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwksIdTokenVerifier;

impl IdTokenVerifier for JwksIdTokenVerifier {
    fn verify(
        &self,
        id_token: &str,
        client_id: &str,
        issuer: &str,
        jwks: &JwkSet,
    ) -> oidc_core::Result<()> {
        let now = i64::try_from(unix_now()).unwrap_or(i64::MAX);
        verify_id_token(id_token, client_id, issuer, jwks, now).map(|_| ())
    }
}
