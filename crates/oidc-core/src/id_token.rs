//! ID token verification
//!
//! Signature checking is delegated to `jsonwebtoken` against the provider's
//! JWK set. Claim checks (issuer, audience, expiry, issued-at) run here
//! against a caller-supplied clock so they are deterministic under test.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode_header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::ISSUED_AT_LEEWAY_SECS;
use crate::error::{Error, IdTokenErrorKind, Result};

/// Claims carried by the provider's ID token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// `aud` may be a single string or an array.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(auds) => auds,
    })
}

fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    jwk.common.key_algorithm.as_ref().and_then(|alg| match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    })
}

fn is_signing_key(jwk: &Jwk) -> bool {
    !matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption))
}

/// Pick the key by `kid`; without a `kid`, the first signing key whose
/// declared algorithm (if any) matches the header.
fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>, alg: Algorithm) -> Result<&'a Jwk> {
    let found = match kid {
        Some(kid) => jwks
            .keys
            .iter()
            .find(|jwk| jwk.common.key_id.as_deref() == Some(kid)),
        None => jwks.keys.iter().find(|jwk| {
            is_signing_key(jwk) && jwk_algorithm(jwk).is_none_or(|key_alg| key_alg == alg)
        }),
    };
    found.ok_or_else(|| {
        Error::id_token(
            IdTokenErrorKind::KeyNotFound,
            format!("no JWK for kid {kid:?} and alg {alg:?}"),
        )
    })
}

/// Verify signature and claims of an ID token.
///
/// `now` is unix seconds. The token must be signed by a key in `jwks`,
/// issued by `issuer` for `client_id`, unexpired, and issued within
/// [`ISSUED_AT_LEEWAY_SECS`] of `now`.
pub fn verify_id_token(
    id_token: &str,
    client_id: &str,
    issuer: &str,
    jwks: &JwkSet,
    now: i64,
) -> Result<IdTokenClaims> {
    let header = decode_header(id_token)
        .map_err(|e| Error::id_token(IdTokenErrorKind::Malformed, format!("header: {e}")))?;

    let jwk = select_key(jwks, header.kid.as_deref(), header.alg)?;
    if let Some(key_alg) = jwk_algorithm(jwk)
        && key_alg != header.alg
    {
        return Err(Error::id_token(
            IdTokenErrorKind::InvalidSignature,
            format!("token alg {:?} does not match key alg {key_alg:?}", header.alg),
        ));
    }

    let key = DecodingKey::from_jwk(jwk)
        .map_err(|e| Error::id_token(IdTokenErrorKind::KeyNotFound, format!("unusable JWK: {e}")))?;

    // Claims are checked below against `now`; the library only verifies the signature.
    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claims = jsonwebtoken::decode::<IdTokenClaims>(id_token, &key, &validation)
        .map_err(|e| {
            let kind = match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => {
                    IdTokenErrorKind::InvalidSignature
                }
                _ => IdTokenErrorKind::Malformed,
            };
            Error::id_token(kind, e.to_string())
        })?
        .claims;

    if claims.iss != issuer {
        return Err(Error::id_token(
            IdTokenErrorKind::IssuerMismatch,
            format!("expected {issuer}, got {}", claims.iss),
        ));
    }

    if !claims.aud.iter().any(|aud| aud == client_id) {
        return Err(Error::id_token(
            IdTokenErrorKind::AudienceMismatch,
            format!("{client_id} not in {:?}", claims.aud),
        ));
    }

    if claims.exp <= now {
        return Err(Error::id_token(
            IdTokenErrorKind::Expired,
            format!("exp {} <= now {now}", claims.exp),
        ));
    }

    if now.abs_diff(claims.iat) > ISSUED_AT_LEEWAY_SECS {
        return Err(Error::id_token(
            IdTokenErrorKind::IssuedAtOutOfRange,
            format!("iat {} is more than {ISSUED_AT_LEEWAY_SECS}s from now {now}", claims.iat),
        ));
    }

    debug!(sub = %claims.sub, iss = %claims.iss, "ID token verified");
    Ok(claims)
}

/// Decode the payload of an ID token without verifying it. Only for
/// reading claims of a token that was verified when it was stored.
pub fn decode_id_token_claims(id_token: &str) -> Result<IdTokenClaims> {
    let mut parts = id_token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::id_token(
            IdTokenErrorKind::Malformed,
            "expected three dot-separated segments",
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::id_token(IdTokenErrorKind::Malformed, format!("payload: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::id_token(IdTokenErrorKind::Malformed, format!("claims: {e}")))
}
