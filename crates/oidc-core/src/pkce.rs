//! PKCE (Proof Key for Code Exchange) and `state` generation per RFC 7636
//!
//! A fresh verifier and state are generated for every sign-in attempt. The
//! verifier never leaves the client until the token exchange; only its S256
//! challenge travels in the authorization URL.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Random bytes behind each verifier and state value. 64 bytes encode to 86
/// base64url characters, inside RFC 7636's 43-128 range.
const RANDOM_BYTES: usize = 64;

fn random_base64url() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Opaque CSRF token for the authorization request. The provider echoes it
/// back on the redirect and the callback check compares it.
pub fn generate_state() -> String {
    random_base64url()
}

/// Cryptographically random PKCE code verifier.
pub fn generate_code_verifier() -> String {
    random_base64url()
}

/// `challenge = BASE64URL(SHA256(verifier))`
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
