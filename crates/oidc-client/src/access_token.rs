//! Cached access tokens, keyed by scope set and resource

use std::time::{SystemTime, UNIX_EPOCH};

use common::Secret;
use serde::{Deserialize, Serialize};

/// An access token with its absolute expiry.
///
/// `expires_at` is unix seconds, computed when the token is stored from the
/// token endpoint's `expires_in` delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: Secret<String>,
    #[serde(default)]
    pub scope: String,
    pub expires_at: u64,
}

impl AccessToken {
    pub fn new(token: String, scope: String, expires_in: u64, now: u64) -> Self {
        Self {
            token: Secret::new(token),
            scope,
            expires_at: now.saturating_add(expires_in),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

/// Cache key for an access token: sorted scopes joined by a space, then
/// `@`, then the resource (empty for the default token).
pub fn access_token_key(resource: Option<&str>, scopes: &[String]) -> String {
    let mut sorted: Vec<&str> = scopes.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("{}@{}", sorted.join(" "), resource.unwrap_or(""))
}

/// Current unix time in seconds. A clock before the epoch reads as 0.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_token_key() {
        assert_eq!(access_token_key(None, &[]), "@");
    }

    #[test]
    fn key_sorts_scopes_and_appends_resource() {
        let scopes = vec!["write".to_string(), "read".to_string()];
        assert_eq!(
            access_token_key(Some("https://api.example.com"), &scopes),
            "read write@https://api.example.com"
        );
    }

    #[test]
    fn expiry_is_absolute() {
        let token = AccessToken::new("at".into(), "openid".into(), 300, 1_000);
        assert_eq!(token.expires_at, 1_300);
        assert!(!token.is_expired(1_299));
        assert!(token.is_expired(1_300));
    }

    #[test]
    fn token_is_redacted_in_debug_but_serialized() {
        let token = AccessToken::new("at_secret".into(), String::new(), 60, 0);
        assert!(!format!("{token:?}").contains("at_secret"));
        let json = serde_json::to_string(&token).unwrap();
        assert!(json.contains("\"token\":\"at_secret\""));
    }
}
