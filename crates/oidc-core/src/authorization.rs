//! Authorization request, sign-in callback and end-session URIs
//!
//! Builds the URL the browser is sent to, checks the redirect the provider
//! sends back, and builds the sign-out URL. Nothing here touches the
//! network.

use std::collections::HashMap;

use tracing::warn;
use url::Url;

use crate::constants::{
    CODE_CHALLENGE_METHOD, DEFAULT_PROMPT, RESERVED_AUTH_PARAMS, RESERVED_SCOPES,
};
use crate::error::{CallbackErrorKind, Error, Result};

/// Inputs for [`generate_sign_in_uri`].
#[derive(Debug, Clone)]
pub struct SignInUriParams<'a> {
    pub authorization_endpoint: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a Url,
    pub code_challenge: &'a str,
    pub state: &'a str,
    pub scopes: &'a [String],
    pub resources: &'a [String],
    /// `None` sends [`DEFAULT_PROMPT`]
    pub prompt: Option<&'a str>,
    pub extra_params: Option<&'a HashMap<String, String>>,
}

/// Reserved scopes first, then the caller's, without duplicates.
pub fn with_reserved_scopes(scopes: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = RESERVED_SCOPES.iter().map(|s| s.to_string()).collect();
    for scope in scopes {
        if !merged.iter().any(|s| s == scope) {
            merged.push(scope.clone());
        }
    }
    merged
}

/// Build the authorization URL.
///
/// Extra params are appended verbatim in key order, except those that would
/// replace a protocol-owned parameter (see [`RESERVED_AUTH_PARAMS`]).
pub fn generate_sign_in_uri(params: &SignInUriParams<'_>) -> Result<Url> {
    let mut url = Url::parse(params.authorization_endpoint).map_err(|e| {
        Error::InvalidUri(format!(
            "authorization endpoint {:?}: {e}",
            params.authorization_endpoint
        ))
    })?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", params.client_id)
            .append_pair("redirect_uri", params.redirect_uri.as_str())
            .append_pair("code_challenge", params.code_challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
            .append_pair("state", params.state)
            .append_pair("scope", &with_reserved_scopes(params.scopes).join(" "))
            .append_pair("response_type", "code")
            .append_pair("prompt", params.prompt.unwrap_or(DEFAULT_PROMPT));

        for resource in params.resources {
            query.append_pair("resource", resource);
        }

        if let Some(extra) = params.extra_params {
            let mut keys: Vec<&String> = extra.keys().collect();
            keys.sort();
            for key in keys {
                if RESERVED_AUTH_PARAMS.contains(&key.as_str()) {
                    warn!(param = %key, "ignoring extra param that shadows a protocol parameter");
                    continue;
                }
                query.append_pair(key, &extra[key]);
            }
        }
    }

    Ok(url)
}

/// Strip query and fragment so two URIs can be compared by location only.
fn location(uri: &Url) -> String {
    let mut stripped = uri.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped.into()
}

/// Validate the redirect the provider sent back and extract the
/// authorization code.
pub fn verify_and_parse_sign_in_callback_uri(
    callback_uri: &Url,
    redirect_uri: &Url,
    state: &str,
) -> Result<String> {
    if !location(callback_uri).starts_with(&location(redirect_uri)) {
        return Err(Error::callback(
            CallbackErrorKind::UriMismatch,
            format!("callback {callback_uri} does not match redirect URI {redirect_uri}"),
        ));
    }

    let query: HashMap<String, String> = callback_uri.query_pairs().into_owned().collect();

    if let Some(error) = query.get("error") {
        let description = query
            .get("error_description")
            .map(String::as_str)
            .unwrap_or("<no description>");
        return Err(Error::callback(
            CallbackErrorKind::ErrorFound,
            format!("{error}: {description}"),
        ));
    }

    match query.get("state") {
        None => {
            return Err(Error::callback(
                CallbackErrorKind::MissingState,
                "callback has no state parameter",
            ));
        }
        Some(returned) if returned != state => {
            return Err(Error::callback(
                CallbackErrorKind::StateMismatch,
                "callback state does not match the request state",
            ));
        }
        Some(_) => {}
    }

    query.get("code").cloned().ok_or_else(|| {
        Error::callback(
            CallbackErrorKind::MissingCode,
            "callback has no code parameter",
        )
    })
}

/// Build the provider's end-session URL for the host to present after
/// local sign-out.
pub fn generate_sign_out_uri(
    end_session_endpoint: &str,
    client_id: &str,
    post_logout_redirect_uri: Option<&str>,
) -> Result<Url> {
    let mut url = Url::parse(end_session_endpoint).map_err(|e| {
        Error::InvalidUri(format!("end session endpoint {end_session_endpoint:?}: {e}"))
    })?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        if let Some(redirect) = post_logout_redirect_uri {
            query.append_pair("post_logout_redirect_uri", redirect);
        }
    }
    Ok(url)
}
